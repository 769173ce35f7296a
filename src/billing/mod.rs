//! Pure billing computation: rate resolution, invoice pricing, and the
//! payment ledger. No I/O happens here; persistence is the services' job.

pub mod invoice;
pub mod ledger;
pub mod money;
pub mod rates;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BillingError {
    /// Every candidate line priced to zero or below. Distinct from the
    /// caller's "no activities found in the period" case.
    #[error("no invoiceable activity in period")]
    NoInvoiceableActivity,
}
