use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Named billable offering. Inactive types are excluded from listings but
/// remain resolvable for historical invoice items.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ServiceType {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub rate_type: String,
    pub rate_amount: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
