//! End-to-end exercise of the billing core: resolve rates for a client,
//! price a month of activities, then settle payments against the resulting
//! invoice total. No database involved; this is the full computation path
//! the invoice and payment services drive.

use anyhow::Result;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use elderflow_api::billing::invoice::{
    build_invoice_items, BillableActivity, ServiceRate, GENERIC_LINE_DESCRIPTION,
};
use elderflow_api::billing::ledger::settle;
use elderflow_api::billing::money::round2;
use elderflow_api::billing::rates::{resolve_billing_context, RateRuleFields, Rounding};
use elderflow_api::billing::BillingError;
use elderflow_api::database::models::invoice::InvoiceStatus;

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
fn month_of_care_priced_and_settled() -> Result<()> {
    // Client overrides the rate; org mandates 15-minute rounding.
    let client_rules = RateRuleFields {
        hourly_rate: Some(dec!(175)),
        min_duration: None,
        rounding: None,
    };
    let org_rules = RateRuleFields {
        hourly_rate: Some(dec!(150)),
        min_duration: Some(10),
        rounding: Rounding::from_config("15m"),
    };

    let ctx = resolve_billing_context(&client_rules, &org_rules);
    assert_eq!(ctx.hourly_rate, dec!(175));
    assert_eq!(ctx.min_duration, 10);
    assert_eq!(ctx.rounding, Rounding::FifteenMinutes);

    let flat_assessment = ServiceRate {
        name: "Initial Assessment".to_string(),
        rate_type: "flat".to_string(),
        rate_amount: dec!(50),
    };

    let activities = vec![
        // 52min -> 45min -> 0.75h * 175 = 131.25
        activity(52, None),
        // flat fee, duration ignored
        activity(10, Some(flat_assessment)),
        // 3min -> floored to 10 -> rounds to 15 -> 0.25h * 175 = 43.75
        activity(3, None),
    ];

    let draft = build_invoice_items(&activities, &ctx)?;
    assert_eq!(draft.items.len(), 3);
    assert_eq!(draft.items[0].amount, dec!(131.25));
    assert_eq!(draft.items[0].description, GENERIC_LINE_DESCRIPTION);
    assert_eq!(draft.items[1].amount, dec!(50.00));
    assert_eq!(draft.items[2].amount, dec!(43.75));
    assert_eq!(draft.total_amount, dec!(225.00));

    // Per-item rounding precedes summation
    let recomputed: Decimal = draft.items.iter().map(|i| round2(i.amount)).sum();
    assert_eq!(draft.total_amount, round2(recomputed));

    // Partial payment bumps the draft to sent and leaves a balance.
    let now = Utc::now();
    let first = settle(draft.total_amount, dec!(120.00), InvoiceStatus::Draft, None, now);
    assert_eq!(first.status, InvoiceStatus::Sent);
    assert_eq!(first.balance_remaining, dec!(105.00));
    assert_eq!(first.paid_at, None);

    // Second payment covers the rest: paid, timestamp set once.
    let second = settle(
        draft.total_amount,
        dec!(225.00),
        first.status,
        first.paid_at,
        now,
    );
    assert_eq!(second.status, InvoiceStatus::Paid);
    assert_eq!(second.paid_at, Some(now));
    assert_eq!(second.balance_remaining, Decimal::ZERO);

    // Overpayment afterwards: still paid, timestamp unchanged, balance 0.
    let later = now + chrono::Duration::days(1);
    let third = settle(
        draft.total_amount,
        dec!(235.00),
        second.status,
        second.paid_at,
        later,
    );
    assert_eq!(third.status, InvoiceStatus::Paid);
    assert_eq!(third.paid_at, Some(now));
    assert_eq!(third.balance_remaining, Decimal::ZERO);

    Ok(())
}

#[test]
fn nothing_payable_is_distinguishable_from_no_activities() -> Result<()> {
    let ctx = resolve_billing_context(
        &RateRuleFields::default(),
        &RateRuleFields {
            hourly_rate: Some(dec!(150)),
            min_duration: None,
            rounding: Rounding::from_config("6m"),
        },
    );

    // Two one-minute check-ins both round to zero: the build fails with the
    // billing-specific error rather than producing an empty invoice.
    let result = build_invoice_items(&[activity(1, None), activity(2, None)], &ctx);
    assert_eq!(result.unwrap_err(), BillingError::NoInvoiceableActivity);

    Ok(())
}

#[test]
fn misconfigured_rate_type_still_bills_hourly() -> Result<()> {
    let ctx = resolve_billing_context(&RateRuleFields::default(), &RateRuleFields::default());

    let odd_service = ServiceRate {
        name: "Companionship".to_string(),
        rate_type: "weekly".to_string(), // not a recognized rate type
        rate_amount: dec!(90),
    };

    let draft = build_invoice_items(&[activity(30, Some(odd_service))], &ctx)?;
    assert_eq!(draft.items[0].quantity, dec!(0.5));
    assert_eq!(draft.items[0].amount, dec!(45.00));

    Ok(())
}
