use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::database::models::rate_rule::RateRule;
use crate::database::models::service_type::ServiceType;

use super::ServiceError;

#[derive(Debug, Deserialize)]
pub struct UpsertRateRuleInput {
    pub hourly_rate: Option<Decimal>,
    pub min_duration_minutes: Option<i32>,
    pub rounding: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateServiceTypeInput {
    pub name: String,
    pub rate_type: String,
    pub rate_amount: Decimal,
}

pub struct RateService {
    pool: PgPool,
}

impl RateService {
    pub async fn new() -> Result<Self, ServiceError> {
        Ok(Self {
            pool: DatabaseManager::pool().await?,
        })
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetch a rule layer. client_id None is the org-wide default row.
    pub async fn get_rule(
        &self,
        org_id: Uuid,
        client_id: Option<Uuid>,
    ) -> Result<Option<RateRule>, ServiceError> {
        let rule = match client_id {
            Some(client_id) => {
                sqlx::query_as::<_, RateRule>(
                    "SELECT * FROM rate_rules WHERE org_id = $1 AND client_id = $2",
                )
                .bind(org_id)
                .bind(client_id)
                .fetch_optional(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, RateRule>(
                    "SELECT * FROM rate_rules WHERE org_id = $1 AND client_id IS NULL",
                )
                .bind(org_id)
                .fetch_optional(&self.pool)
                .await?
            }
        };
        Ok(rule)
    }

    /// Create or replace a rule layer. The stored values keep their
    /// configured form; "falsy means absent" is applied at resolution time,
    /// not here.
    pub async fn upsert_rule(
        &self,
        org_id: Uuid,
        client_id: Option<Uuid>,
        input: &UpsertRateRuleInput,
    ) -> Result<RateRule, ServiceError> {
        if let Some(rounding) = &input.rounding {
            if !matches!(rounding.as_str(), "none" | "6m" | "15m") {
                return Err(ServiceError::Validation(format!(
                    "Unknown rounding policy '{}' (expected none, 6m, or 15m)",
                    rounding
                )));
            }
        }

        if let Some(client_id) = client_id {
            // Client must exist in this org before it can carry an override
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM clients WHERE id = $1 AND org_id = $2)")
                    .bind(client_id)
                    .bind(org_id)
                    .fetch_one(&self.pool)
                    .await?;
            if !exists {
                return Err(ServiceError::NotFound("Client not found".to_string()));
            }

            let rule = sqlx::query_as::<_, RateRule>(
                r#"
                INSERT INTO rate_rules (org_id, client_id, hourly_rate, min_duration_minutes, rounding)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (org_id, client_id) WHERE client_id IS NOT NULL
                DO UPDATE SET hourly_rate = EXCLUDED.hourly_rate,
                              min_duration_minutes = EXCLUDED.min_duration_minutes,
                              rounding = EXCLUDED.rounding,
                              updated_at = now()
                RETURNING *
                "#,
            )
            .bind(org_id)
            .bind(client_id)
            .bind(input.hourly_rate)
            .bind(input.min_duration_minutes)
            .bind(&input.rounding)
            .fetch_one(&self.pool)
            .await?;
            Ok(rule)
        } else {
            let rule = sqlx::query_as::<_, RateRule>(
                r#"
                INSERT INTO rate_rules (org_id, client_id, hourly_rate, min_duration_minutes, rounding)
                VALUES ($1, NULL, $2, $3, $4)
                ON CONFLICT (org_id) WHERE client_id IS NULL
                DO UPDATE SET hourly_rate = EXCLUDED.hourly_rate,
                              min_duration_minutes = EXCLUDED.min_duration_minutes,
                              rounding = EXCLUDED.rounding,
                              updated_at = now()
                RETURNING *
                "#,
            )
            .bind(org_id)
            .bind(input.hourly_rate)
            .bind(input.min_duration_minutes)
            .bind(&input.rounding)
            .fetch_one(&self.pool)
            .await?;
            Ok(rule)
        }
    }

    /// Active service types for org listings. Inactive types stay in the
    /// table for historical invoice items that reference them.
    pub async fn list_service_types(&self, org_id: Uuid) -> Result<Vec<ServiceType>, ServiceError> {
        let types = sqlx::query_as::<_, ServiceType>(
            "SELECT * FROM service_types WHERE org_id = $1 AND is_active ORDER BY name",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(types)
    }

    pub async fn create_service_type(
        &self,
        org_id: Uuid,
        input: &CreateServiceTypeInput,
    ) -> Result<ServiceType, ServiceError> {
        if input.name.trim().is_empty() {
            return Err(ServiceError::Validation(
                "Service type name must not be empty".to_string(),
            ));
        }
        // Billing tolerates unrecognized rate types (defaults to hourly),
        // but new configuration is held to the known set.
        if !matches!(input.rate_type.as_str(), "hourly" | "flat") {
            return Err(ServiceError::Validation(format!(
                "Unknown rate type '{}' (expected hourly or flat)",
                input.rate_type
            )));
        }
        if input.rate_amount < Decimal::ZERO {
            return Err(ServiceError::Validation(
                "Rate amount must not be negative".to_string(),
            ));
        }

        let service_type = sqlx::query_as::<_, ServiceType>(
            r#"
            INSERT INTO service_types (org_id, name, rate_type, rate_amount)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(org_id)
        .bind(input.name.trim())
        .bind(&input.rate_type)
        .bind(input.rate_amount)
        .fetch_one(&self.pool)
        .await?;
        Ok(service_type)
    }

    /// Soft delete: flips is_active so historical invoice items keep their
    /// reference.
    pub async fn deactivate_service_type(
        &self,
        org_id: Uuid,
        service_type_id: Uuid,
    ) -> Result<ServiceType, ServiceError> {
        sqlx::query_as::<_, ServiceType>(
            "UPDATE service_types SET is_active = FALSE WHERE id = $1 AND org_id = $2 RETURNING *",
        )
        .bind(service_type_id)
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Service type not found".to_string()))
    }
}
