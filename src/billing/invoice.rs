//! Invoice Builder: prices a batch of billable activities for one client
//! and period into line items and a total. Pure computation; the caller
//! persists the result.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::money::round2;
use super::rates::{adjust_minutes, BillingContext};
use super::BillingError;

/// Line description used when an activity has no service type attached.
pub const GENERIC_LINE_DESCRIPTION: &str = "Care Management Services";

/// Rate information carried by an activity's service type. When present it
/// takes precedence over the generic rule resolution entirely.
#[derive(Debug, Clone)]
pub struct ServiceRate {
    pub name: String,
    pub rate_type: String,
    pub rate_amount: Decimal,
}

impl ServiceRate {
    /// Anything that is not literally "flat" bills hourly, including
    /// misspelled or unrecognized rate types.
    fn is_flat(&self) -> bool {
        self.rate_type == "flat"
    }
}

/// The billing view of one activity.
#[derive(Debug, Clone)]
pub struct BillableActivity {
    pub activity_id: Uuid,
    pub duration_minutes: Option<i64>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub service: Option<ServiceRate>,
}

impl BillableActivity {
    /// Stored duration wins when present and non-zero; otherwise derive
    /// whole minutes from the start/end pair, rounded.
    fn effective_minutes(&self) -> i64 {
        match self.duration_minutes {
            Some(minutes) if minutes != 0 => minutes,
            _ => match self.ended_at {
                Some(ended) => {
                    let seconds = (ended - self.started_at).num_seconds();
                    if seconds <= 0 {
                        0
                    } else {
                        (seconds + 30) / 60
                    }
                }
                None => 0,
            },
        }
    }
}

/// One priced line, not yet persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftLine {
    pub activity_id: Option<Uuid>,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub amount: Decimal,
}

/// The computed invoice body: lines plus a total that is the sum of the
/// already-rounded line amounts (rounding precedes summation).
#[derive(Debug, Clone, PartialEq)]
pub struct DraftInvoice {
    pub items: Vec<DraftLine>,
    pub total_amount: Decimal,
}

fn price_activity(activity: &BillableActivity, ctx: &BillingContext) -> DraftLine {
    match &activity.service {
        Some(service) if service.is_flat() => DraftLine {
            activity_id: Some(activity.activity_id),
            description: service.name.clone(),
            quantity: Decimal::ONE,
            unit_price: service.rate_amount,
            // Duration is irrelevant for flat items.
            amount: round2(service.rate_amount),
        },
        Some(service) => {
            // Hourly service type. It carries its own rate but borrows the
            // resolved context's minimum and rounding policies.
            let adjusted = adjust_minutes(
                activity.effective_minutes(),
                ctx.min_duration,
                ctx.rounding,
            );
            let quantity = Decimal::from(adjusted) / Decimal::from(60);
            DraftLine {
                activity_id: Some(activity.activity_id),
                description: service.name.clone(),
                quantity,
                unit_price: service.rate_amount,
                amount: round2(quantity * service.rate_amount),
            }
        }
        None => {
            let adjusted = adjust_minutes(
                activity.effective_minutes(),
                ctx.min_duration,
                ctx.rounding,
            );
            let quantity = Decimal::from(adjusted) / Decimal::from(60);
            DraftLine {
                activity_id: Some(activity.activity_id),
                description: GENERIC_LINE_DESCRIPTION.to_string(),
                quantity,
                unit_price: ctx.hourly_rate,
                amount: round2(quantity * ctx.hourly_rate),
            }
        }
    }
}

/// Build priced invoice lines for a set of activities. Lines that price to
/// zero or below are dropped silently; if nothing payable remains the whole
/// build fails with `NoInvoiceableActivity`.
pub fn build_invoice_items(
    activities: &[BillableActivity],
    ctx: &BillingContext,
) -> Result<DraftInvoice, BillingError> {
    let items: Vec<DraftLine> = activities
        .iter()
        .map(|activity| price_activity(activity, ctx))
        .filter(|line| line.amount > Decimal::ZERO)
        .collect();

    if items.is_empty() {
        return Err(BillingError::NoInvoiceableActivity);
    }

    let total_amount = round2(items.iter().map(|line| line.amount).sum());

    Ok(DraftInvoice {
        items,
        total_amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::rates::Rounding;
    use rust_decimal_macros::dec;

    fn ctx(rate: Decimal, min: i64, rounding: Rounding) -> BillingContext {
        BillingContext {
            hourly_rate: rate,
            min_duration: min,
            rounding,
        }
    }

    fn activity(minutes: i64, service: Option<ServiceRate>) -> BillableActivity {
        BillableActivity {
            activity_id: Uuid::new_v4(),
            duration_minutes: Some(minutes),
            started_at: Utc::now(),
            ended_at: None,
            service,
        }
    }

    #[test]
    fn hourly_rate_with_fifteen_minute_rounding() {
        // 52min rounds to 45 -> 0.75h at 175/h = 131.25
        let draft = build_invoice_items(
            &[activity(52, None)],
            &ctx(dec!(175), 0, Rounding::FifteenMinutes),
        )
        .unwrap();

        assert_eq!(draft.items.len(), 1);
        let line = &draft.items[0];
        assert_eq!(line.quantity, dec!(0.75));
        assert_eq!(line.unit_price, dec!(175));
        assert_eq!(line.amount, dec!(131.25));
        assert_eq!(line.description, GENERIC_LINE_DESCRIPTION);
        assert_eq!(draft.total_amount, dec!(131.25));
    }

    #[test]
    fn flat_service_type_ignores_duration() {
        let service = ServiceRate {
            name: "Initial Assessment".to_string(),
            rate_type: "flat".to_string(),
            rate_amount: dec!(50),
        };
        let draft =
            build_invoice_items(&[activity(10, Some(service))], &ctx(dec!(175), 30, Rounding::FifteenMinutes))
                .unwrap();

        let line = &draft.items[0];
        assert_eq!(line.quantity, Decimal::ONE);
        assert_eq!(line.amount, dec!(50.00));
        assert_eq!(line.description, "Initial Assessment");
    }

    #[test]
    fn minimum_duration_floor_without_rounding() {
        // 12min floors to 30 -> 0.5h
        let draft =
            build_invoice_items(&[activity(12, None)], &ctx(dec!(100), 30, Rounding::None)).unwrap();
        assert_eq!(draft.items[0].quantity, dec!(0.5));
        assert_eq!(draft.items[0].amount, dec!(50.00));
    }

    #[test]
    fn unrecognized_rate_type_bills_hourly() {
        let service = ServiceRate {
            name: "Weekly Check-in".to_string(),
            rate_type: "weekly".to_string(),
            rate_amount: dec!(120),
        };
        let draft =
            build_invoice_items(&[activity(60, Some(service))], &ctx(dec!(175), 0, Rounding::None))
                .unwrap();

        let line = &draft.items[0];
        assert_eq!(line.quantity, Decimal::ONE);
        assert_eq!(line.unit_price, dec!(120));
        assert_eq!(line.amount, dec!(120.00));
    }

    #[test]
    fn hourly_service_uses_context_min_and_rounding() {
        let service = ServiceRate {
            name: "Medication Review".to_string(),
            rate_type: "hourly".to_string(),
            rate_amount: dec!(200),
        };
        // 3min -> floored to 10 -> rounded to 15 -> 0.25h at 200/h
        let draft = build_invoice_items(
            &[activity(3, Some(service))],
            &ctx(dec!(175), 10, Rounding::FifteenMinutes),
        )
        .unwrap();
        assert_eq!(draft.items[0].quantity, dec!(0.25));
        assert_eq!(draft.items[0].amount, dec!(50.00));
    }

    #[test]
    fn zero_amount_lines_are_dropped() {
        // 2min rounds to 0 under 6m policy, 52min survives
        let draft = build_invoice_items(
            &[activity(2, None), activity(52, None)],
            &ctx(dec!(150), 0, Rounding::SixMinutes),
        )
        .unwrap();
        assert_eq!(draft.items.len(), 1);
        assert_eq!(draft.items[0].quantity, dec!(0.9)); // 54/60
    }

    #[test]
    fn all_lines_zero_is_no_invoiceable_activity() {
        let result = build_invoice_items(
            &[activity(1, None), activity(2, None)],
            &ctx(dec!(150), 0, Rounding::SixMinutes),
        );
        assert_eq!(result.unwrap_err(), BillingError::NoInvoiceableActivity);
    }

    #[test]
    fn duration_derived_from_start_end_when_not_stored() {
        let started = Utc::now();
        let a = BillableActivity {
            activity_id: Uuid::new_v4(),
            duration_minutes: None,
            started_at: started,
            ended_at: Some(started + chrono::Duration::seconds(52 * 60 + 20)),
            service: None,
        };
        assert_eq!(a.effective_minutes(), 52);

        let b = BillableActivity {
            duration_minutes: Some(0),
            ..a.clone()
        };
        // Stored zero is treated as absent
        assert_eq!(b.effective_minutes(), 52);
    }

    #[test]
    fn per_item_rounding_precedes_summation() {
        // Each line is 10min at 100/h = 16.666... -> 16.67 per line.
        // Sum of rounded lines: 50.01; rounding once at the end would give 50.00.
        let draft = build_invoice_items(
            &[activity(10, None), activity(10, None), activity(10, None)],
            &ctx(dec!(100), 0, Rounding::None),
        )
        .unwrap();

        for line in &draft.items {
            assert_eq!(line.amount, dec!(16.67));
        }
        assert_eq!(draft.total_amount, dec!(50.01));
    }
}
