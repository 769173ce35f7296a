//! Payment Ledger: given an invoice's total and the sum of its completed
//! payments, derive the new status, the paid timestamp, and the balance.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::database::models::invoice::InvoiceStatus;

/// Result of settling the ledger after a payment lands.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerOutcome {
    pub status: InvoiceStatus,
    pub paid_at: Option<DateTime<Utc>>,
    /// Never negative: overpayment reports a zero balance.
    pub balance_remaining: Decimal,
}

/// Recompute invoice state from the cumulative paid amount.
///
/// Fully covered invoices become `paid`; `paid_at` is set once and repeated
/// overpayment never resets it. A partial payment on a `draft` invoice bumps
/// it to `sent` regardless of whether the payment arrived via the admin
/// endpoint or the gateway webhook (single policy, both entry points share
/// this path).
pub fn settle(
    total_amount: Decimal,
    total_paid: Decimal,
    current_status: InvoiceStatus,
    paid_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> LedgerOutcome {
    let remaining = total_amount - total_paid;

    if remaining <= Decimal::ZERO {
        return LedgerOutcome {
            status: InvoiceStatus::Paid,
            paid_at: paid_at.or(Some(now)),
            balance_remaining: Decimal::ZERO,
        };
    }

    let status = match current_status {
        InvoiceStatus::Draft => InvoiceStatus::Sent,
        other => other,
    };

    LedgerOutcome {
        status,
        paid_at,
        balance_remaining: remaining,
    }
}

/// Reporting view of an invoice status: a sent invoice whose period ended
/// more than `overdue_after_days` ago reads as overdue. The stored status is
/// not mutated; this only affects what list/detail responses report.
pub fn reported_status(
    status: InvoiceStatus,
    period_end: NaiveDate,
    today: NaiveDate,
    overdue_after_days: i64,
) -> InvoiceStatus {
    if status == InvoiceStatus::Sent && (today - period_end).num_days() > overdue_after_days {
        InvoiceStatus::Overdue
    } else {
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn partial_payment_keeps_balance_and_bumps_draft() {
        let now = Utc::now();
        let out = settle(dec!(200.00), dec!(120.00), InvoiceStatus::Draft, None, now);
        assert_eq!(out.status, InvoiceStatus::Sent);
        assert_eq!(out.balance_remaining, dec!(80.00));
        assert_eq!(out.paid_at, None);
    }

    #[test]
    fn partial_payment_on_sent_invoice_stays_sent() {
        let now = Utc::now();
        let out = settle(dec!(200.00), dec!(120.00), InvoiceStatus::Sent, None, now);
        assert_eq!(out.status, InvoiceStatus::Sent);
        assert_eq!(out.balance_remaining, dec!(80.00));
    }

    #[test]
    fn full_coverage_flips_to_paid_once() {
        let now = Utc::now();
        let out = settle(dec!(200.00), dec!(200.00), InvoiceStatus::Sent, None, now);
        assert_eq!(out.status, InvoiceStatus::Paid);
        assert_eq!(out.paid_at, Some(now));
        assert_eq!(out.balance_remaining, Decimal::ZERO);

        // A later overpayment keeps the original timestamp and reports zero,
        // never a negative balance.
        let later = now + chrono::Duration::hours(5);
        let out2 = settle(dec!(200.00), dec!(210.00), InvoiceStatus::Paid, out.paid_at, later);
        assert_eq!(out2.status, InvoiceStatus::Paid);
        assert_eq!(out2.paid_at, Some(now));
        assert_eq!(out2.balance_remaining, Decimal::ZERO);
    }

    #[test]
    fn overdue_is_a_reporting_view_only() {
        let period_end = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();

        let within = NaiveDate::from_ymd_opt(2026, 2, 10).unwrap();
        assert_eq!(
            reported_status(InvoiceStatus::Sent, period_end, within, 14),
            InvoiceStatus::Sent
        );

        let past = NaiveDate::from_ymd_opt(2026, 2, 15).unwrap();
        assert_eq!(
            reported_status(InvoiceStatus::Sent, period_end, past, 14),
            InvoiceStatus::Overdue
        );

        // Draft and paid invoices never report overdue.
        assert_eq!(
            reported_status(InvoiceStatus::Draft, period_end, past, 14),
            InvoiceStatus::Draft
        );
        assert_eq!(
            reported_status(InvoiceStatus::Paid, period_end, past, 14),
            InvoiceStatus::Paid
        );
    }
}
