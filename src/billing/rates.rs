//! Rate Resolver: layers client override rules over org defaults to produce
//! the billing parameters applied to one activity's duration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::database::models::rate_rule::RateRule;

/// Hard-coded last-resort hourly rate when neither rule layer supplies one.
pub fn fallback_hourly_rate() -> Decimal {
    Decimal::from(150)
}

/// Duration rounding policy for hourly billing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Rounding {
    #[default]
    None,
    SixMinutes,
    FifteenMinutes,
}

impl Rounding {
    /// Parse a stored rounding value. Only "6m" and "15m" count as a
    /// configured policy; "none", NULL, and anything unrecognized are all
    /// treated as absent at that layer. A client therefore cannot suppress
    /// an org-mandated rounding by configuring "none".
    pub fn from_config(value: &str) -> Option<Rounding> {
        match value {
            "6m" => Some(Rounding::SixMinutes),
            "15m" => Some(Rounding::FifteenMinutes),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Rounding::None => "none",
            Rounding::SixMinutes => "6m",
            Rounding::FifteenMinutes => "15m",
        }
    }

    fn increment(&self) -> Option<i64> {
        match self {
            Rounding::None => None,
            Rounding::SixMinutes => Some(6),
            Rounding::FifteenMinutes => Some(15),
        }
    }
}

/// The optional-field view of one rule layer. Fields resolve independently:
/// a client rule that only sets min_duration still inherits the org's rate.
#[derive(Debug, Clone, Default)]
pub struct RateRuleFields {
    pub hourly_rate: Option<Decimal>,
    pub min_duration: Option<i64>,
    pub rounding: Option<Rounding>,
}

impl RateRuleFields {
    /// A configured rate of zero falls through to the next layer. This is a
    /// deliberate quirk carried over from the original rule semantics.
    fn present_rate(&self) -> Option<Decimal> {
        self.hourly_rate.filter(|r| !r.is_zero())
    }

    /// Zero minutes is equivalent to "no minimum" and falls through.
    fn present_min_duration(&self) -> Option<i64> {
        self.min_duration.filter(|m| *m > 0)
    }
}

impl From<&RateRule> for RateRuleFields {
    fn from(rule: &RateRule) -> Self {
        Self {
            hourly_rate: rule.hourly_rate,
            min_duration: rule.min_duration_minutes.map(i64::from),
            rounding: rule.rounding.as_deref().and_then(Rounding::from_config),
        }
    }
}

/// The resolved `{hourly_rate, min_duration, rounding}` triple used to price
/// one activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingContext {
    pub hourly_rate: Decimal,
    pub min_duration: i64,
    pub rounding: Rounding,
}

/// Resolve billing parameters by first-non-empty-wins over an ordered list
/// of layers: client override first, then org default, then hard fallbacks.
/// Resolution always succeeds; invalid or missing fields are treated as
/// absent, never as errors.
pub fn resolve_billing_context(client: &RateRuleFields, org: &RateRuleFields) -> BillingContext {
    let layers = [client, org];

    BillingContext {
        hourly_rate: layers
            .iter()
            .find_map(|l| l.present_rate())
            .unwrap_or_else(fallback_hourly_rate),
        min_duration: layers
            .iter()
            .find_map(|l| l.present_min_duration())
            .unwrap_or(0),
        rounding: layers
            .iter()
            .find_map(|l| l.rounding)
            .unwrap_or(Rounding::None),
    }
}

/// Apply the minimum-duration floor, then the rounding policy. The order
/// matters: a 3-minute visit with a 10-minute floor and 15m rounding becomes
/// 10 first and then rounds up to 15. Midpoints round half-up.
pub fn adjust_minutes(minutes: i64, min_duration: i64, rounding: Rounding) -> i64 {
    let mut minutes = minutes;
    if min_duration > 0 && minutes < min_duration {
        minutes = min_duration;
    }

    match rounding.increment() {
        Some(inc) => ((2 * minutes + inc) / (2 * inc)) * inc,
        None => minutes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn fields(
        rate: Option<Decimal>,
        min: Option<i64>,
        rounding: Option<&str>,
    ) -> RateRuleFields {
        RateRuleFields {
            hourly_rate: rate,
            min_duration: min,
            rounding: rounding.and_then(Rounding::from_config),
        }
    }

    #[test]
    fn client_rate_wins_over_org() {
        let ctx = resolve_billing_context(
            &fields(Some(dec!(175)), None, None),
            &fields(Some(dec!(150)), Some(30), Some("15m")),
        );
        assert_eq!(ctx.hourly_rate, dec!(175));
        assert_eq!(ctx.min_duration, 30);
        assert_eq!(ctx.rounding, Rounding::FifteenMinutes);
    }

    #[test]
    fn zero_rate_falls_through_to_org() {
        let ctx = resolve_billing_context(
            &fields(Some(dec!(0)), None, None),
            &fields(Some(dec!(120)), None, None),
        );
        assert_eq!(ctx.hourly_rate, dec!(120));
    }

    #[test]
    fn hard_fallbacks_when_both_layers_empty() {
        let ctx = resolve_billing_context(&RateRuleFields::default(), &RateRuleFields::default());
        assert_eq!(ctx.hourly_rate, dec!(150));
        assert_eq!(ctx.min_duration, 0);
        assert_eq!(ctx.rounding, Rounding::None);
    }

    #[test]
    fn client_cannot_suppress_org_rounding_with_none() {
        // "none" parses as absent, so the org's 6m mandate still applies.
        let ctx = resolve_billing_context(
            &fields(None, None, Some("none")),
            &fields(None, None, Some("6m")),
        );
        assert_eq!(ctx.rounding, Rounding::SixMinutes);
    }

    #[test]
    fn unrecognized_rounding_is_absent() {
        assert_eq!(Rounding::from_config("10m"), None);
        assert_eq!(Rounding::from_config(""), None);
        assert_eq!(Rounding::from_config("15m"), Some(Rounding::FifteenMinutes));
    }

    #[test]
    fn floor_applies_before_rounding() {
        // 3 -> floored to 10 -> rounds to 15, not 3 -> 0 or 3 -> 15-then-compare
        assert_eq!(adjust_minutes(3, 10, Rounding::FifteenMinutes), 15);
    }

    #[test]
    fn rounds_to_nearest_six() {
        assert_eq!(adjust_minutes(2, 0, Rounding::SixMinutes), 0);
        assert_eq!(adjust_minutes(3, 0, Rounding::SixMinutes), 6); // half rounds up
        assert_eq!(adjust_minutes(8, 0, Rounding::SixMinutes), 6);
        assert_eq!(adjust_minutes(9, 0, Rounding::SixMinutes), 12);
        assert_eq!(adjust_minutes(52, 0, Rounding::SixMinutes), 54);
    }

    #[test]
    fn rounds_to_nearest_fifteen() {
        assert_eq!(adjust_minutes(52, 0, Rounding::FifteenMinutes), 45);
        assert_eq!(adjust_minutes(53, 0, Rounding::FifteenMinutes), 60);
        assert_eq!(adjust_minutes(7, 0, Rounding::FifteenMinutes), 0);
    }

    #[test]
    fn floor_without_rounding_is_identity_above_minimum() {
        assert_eq!(adjust_minutes(12, 30, Rounding::None), 30);
        assert_eq!(adjust_minutes(45, 30, Rounding::None), 45);
    }

    #[test]
    fn adjusted_result_properties() {
        for minutes in 0..200 {
            for &(min, rounding) in &[
                (0i64, Rounding::SixMinutes),
                (10, Rounding::SixMinutes),
                (30, Rounding::FifteenMinutes),
                (30, Rounding::None),
            ] {
                let out = adjust_minutes(minutes, min, rounding);
                if min > 0 && rounding == Rounding::None {
                    assert!(out >= min);
                }
                if let Some(inc) = rounding.increment() {
                    assert_eq!(out % inc, 0, "minutes={minutes} min={min}");
                }
            }
        }
    }
}
