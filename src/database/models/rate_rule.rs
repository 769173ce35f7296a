use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One layer of rate configuration. client_id NULL is the org-wide default;
/// a client row overrides the default field by field, not record by record.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RateRule {
    pub id: Uuid,
    pub org_id: Uuid,
    pub client_id: Option<Uuid>,
    pub hourly_rate: Option<Decimal>,
    pub min_duration_minutes: Option<i32>,
    pub rounding: Option<String>,
    pub updated_at: DateTime<Utc>,
}
