use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::auth::Role;
use crate::billing::invoice::{build_invoice_items, BillableActivity, ServiceRate};
use crate::billing::ledger::reported_status;
use crate::billing::rates::{resolve_billing_context, RateRuleFields};
use crate::config;
use crate::database::manager::DatabaseManager;
use crate::database::models::client::Client;
use crate::database::models::invoice::{Invoice, InvoiceItem, InvoiceStatus};
use crate::database::models::payment::{Payment, PAYMENT_STATUS_COMPLETED};
use crate::database::models::rate_rule::RateRule;
use crate::middleware::auth::AuthUser;

use super::ServiceError;

#[derive(Debug, Deserialize)]
pub struct GenerateInvoiceRequest {
    pub client_id: Uuid,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct InvoiceWithItems {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
}

/// Full detail view: items, payments, and the running ledger numbers.
#[derive(Debug, Serialize)]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: Invoice,
    /// Status as reported to clients; sent invoices past the overdue window
    /// read as "overdue" without the stored row changing.
    pub reported_status: String,
    pub items: Vec<InvoiceItem>,
    pub payments: Vec<Payment>,
    pub total_paid: Decimal,
    pub balance: Decimal,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListInvoicesFilter {
    pub status: Option<String>,
    pub client_id: Option<Uuid>,
}

/// Billable activity joined with its (optional) service type rate.
#[derive(Debug, FromRow)]
struct ActivityRow {
    id: Uuid,
    duration_minutes: Option<i32>,
    started_at: chrono::DateTime<Utc>,
    ended_at: Option<chrono::DateTime<Utc>>,
    service_name: Option<String>,
    service_rate_type: Option<String>,
    service_rate_amount: Option<Decimal>,
}

impl From<ActivityRow> for BillableActivity {
    fn from(row: ActivityRow) -> Self {
        let service = match (row.service_name, row.service_rate_type, row.service_rate_amount) {
            (Some(name), Some(rate_type), Some(rate_amount)) => Some(ServiceRate {
                name,
                rate_type,
                rate_amount,
            }),
            _ => None,
        };

        BillableActivity {
            activity_id: row.id,
            duration_minutes: row.duration_minutes.map(i64::from),
            started_at: row.started_at,
            ended_at: row.ended_at,
            service,
        }
    }
}

pub struct InvoiceService {
    pool: PgPool,
}

impl InvoiceService {
    pub async fn new() -> Result<Self, ServiceError> {
        Ok(Self {
            pool: DatabaseManager::pool().await?,
        })
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load a client within the caller's org. Care managers may only touch
    /// clients assigned to them.
    async fn load_client_scoped(
        &self,
        actor: &AuthUser,
        client_id: Uuid,
    ) -> Result<Client, ServiceError> {
        let client = sqlx::query_as::<_, Client>(
            "SELECT * FROM clients WHERE id = $1 AND org_id = $2",
        )
        .bind(client_id)
        .bind(actor.org_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Client not found".to_string()))?;

        if actor.role == Role::CareManager && client.care_manager_id != Some(actor.user_id) {
            return Err(ServiceError::Forbidden(
                "Client is not assigned to this care manager".to_string(),
            ));
        }

        Ok(client)
    }

    async fn load_invoice_scoped(
        &self,
        actor: &AuthUser,
        invoice_id: Uuid,
    ) -> Result<Invoice, ServiceError> {
        sqlx::query_as::<_, Invoice>(
            "SELECT * FROM invoices WHERE id = $1 AND org_id = $2",
        )
        .bind(invoice_id)
        .bind(actor.org_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Invoice not found".to_string()))
    }

    /// Generate a draft invoice for one client and period. The invoice row
    /// and all of its items are written in a single transaction so a failure
    /// mid-way never leaves an invoice without items.
    pub async fn generate(
        &self,
        actor: &AuthUser,
        req: &GenerateInvoiceRequest,
    ) -> Result<InvoiceWithItems, ServiceError> {
        if req.period_start > req.period_end {
            let mut field_errors = std::collections::HashMap::new();
            field_errors.insert(
                "period_end".to_string(),
                "period_end must not precede period_start".to_string(),
            );
            return Err(ServiceError::FieldValidation {
                message: "Invalid invoice period".to_string(),
                field_errors,
            });
        }

        let client = self.load_client_scoped(actor, req.client_id).await?;

        // Billable activities in the period that no invoice item references yet
        let rows = sqlx::query_as::<_, ActivityRow>(
            r#"
            SELECT a.id, a.duration_minutes, a.started_at, a.ended_at,
                   st.name AS service_name,
                   st.rate_type AS service_rate_type,
                   st.rate_amount AS service_rate_amount
            FROM activities a
            LEFT JOIN service_types st ON st.id = a.service_type_id
            WHERE a.org_id = $1
              AND a.client_id = $2
              AND a.billable
              AND a.started_at::date >= $3
              AND a.started_at::date <= $4
              AND NOT EXISTS (
                  SELECT 1 FROM invoice_items ii WHERE ii.activity_id = a.id
              )
            ORDER BY a.started_at
            "#,
        )
        .bind(actor.org_id)
        .bind(client.id)
        .bind(req.period_start)
        .bind(req.period_end)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Err(ServiceError::Validation(
                "No billable activities found in this period".to_string(),
            ));
        }

        let context = {
            let client_rule = self.rule_fields(actor.org_id, Some(client.id)).await?;
            let org_rule = self.rule_fields(actor.org_id, None).await?;
            resolve_billing_context(&client_rule, &org_rule)
        };

        let activities: Vec<BillableActivity> = rows.into_iter().map(Into::into).collect();
        let draft = build_invoice_items(&activities, &context)?;

        let mut tx = self.pool.begin().await?;

        let insert_result = sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices (org_id, client_id, period_start, period_end, status, total_amount, currency)
            VALUES ($1, $2, $3, $4, 'draft', $5, $6)
            RETURNING *
            "#,
        )
        .bind(actor.org_id)
        .bind(client.id)
        .bind(req.period_start)
        .bind(req.period_end)
        .bind(draft.total_amount)
        .bind(&config::config().billing.default_currency)
        .fetch_one(&mut *tx)
        .await;

        let invoice = match insert_result {
            Ok(invoice) => invoice,
            Err(e) if super::is_unique_violation(&e) => {
                return Err(ServiceError::Conflict(
                    "An invoice already exists for this client and period".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        let mut items = Vec::with_capacity(draft.items.len());
        for line in &draft.items {
            let item = sqlx::query_as::<_, InvoiceItem>(
                r#"
                INSERT INTO invoice_items (invoice_id, activity_id, description, quantity, unit_price, amount)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
                "#,
            )
            .bind(invoice.id)
            .bind(line.activity_id)
            .bind(&line.description)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.amount)
            .fetch_one(&mut *tx)
            .await?;
            items.push(item);
        }

        tx.commit().await?;

        tracing::info!(
            invoice_id = %invoice.id,
            client_id = %client.id,
            total = %invoice.total_amount,
            items = items.len(),
            "invoice generated"
        );

        Ok(InvoiceWithItems { invoice, items })
    }

    async fn rule_fields(
        &self,
        org_id: Uuid,
        client_id: Option<Uuid>,
    ) -> Result<RateRuleFields, ServiceError> {
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

        Ok(rule.as_ref().map(RateRuleFields::from).unwrap_or_default())
    }

    /// Admin approval: draft -> sent, stamping sent_at.
    pub async fn approve(&self, actor: &AuthUser, invoice_id: Uuid) -> Result<Invoice, ServiceError> {
        let invoice = self.load_invoice_scoped(actor, invoice_id).await?;

        if InvoiceStatus::from_string(&invoice.status) != InvoiceStatus::Draft {
            return Err(ServiceError::Validation(format!(
                "Only draft invoices can be approved (current status: {})",
                invoice.status
            )));
        }

        let updated = sqlx::query_as::<_, Invoice>(
            "UPDATE invoices SET status = 'sent', sent_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(invoice.id)
        .fetch_one(&self.pool)
        .await?;

        Ok(updated)
    }

    /// Invoice detail with items, payments, and ledger numbers. Care
    /// managers may only read invoices for their own clients.
    pub async fn get(&self, actor: &AuthUser, invoice_id: Uuid) -> Result<InvoiceDetail, ServiceError> {
        let invoice = self.load_invoice_scoped(actor, invoice_id).await?;

        // Ownership gate for care managers
        self.load_client_scoped(actor, invoice.client_id).await?;

        let items = sqlx::query_as::<_, InvoiceItem>(
            "SELECT * FROM invoice_items WHERE invoice_id = $1 ORDER BY created_at",
        )
        .bind(invoice.id)
        .fetch_all(&self.pool)
        .await?;

        let payments = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE invoice_id = $1 ORDER BY paid_at",
        )
        .bind(invoice.id)
        .fetch_all(&self.pool)
        .await?;

        let total_paid: Decimal = payments
            .iter()
            .filter(|p| p.status == PAYMENT_STATUS_COMPLETED)
            .map(|p| p.amount)
            .sum();
        let balance = (invoice.total_amount - total_paid).max(Decimal::ZERO);

        let reported = reported_status(
            InvoiceStatus::from_string(&invoice.status),
            invoice.period_end,
            Utc::now().date_naive(),
            config::config().billing.overdue_after_days,
        );

        Ok(InvoiceDetail {
            invoice,
            reported_status: reported.as_str().to_string(),
            items,
            payments,
            total_paid,
            balance,
        })
    }

    /// Org-scoped invoice listing. Care managers see only invoices for
    /// clients assigned to them.
    pub async fn list(
        &self,
        actor: &AuthUser,
        filter: &ListInvoicesFilter,
    ) -> Result<Vec<InvoiceSummary>, ServiceError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT i.* FROM invoices i JOIN clients c ON c.id = i.client_id WHERE i.org_id = ",
        );
        builder.push_bind(actor.org_id);

        if actor.role == Role::CareManager {
            builder.push(" AND c.care_manager_id = ");
            builder.push_bind(actor.user_id);
        }
        if let Some(client_id) = filter.client_id {
            builder.push(" AND i.client_id = ");
            builder.push_bind(client_id);
        }
        if let Some(status) = &filter.status {
            builder.push(" AND i.status = ");
            builder.push_bind(status.clone());
        }
        builder.push(" ORDER BY i.created_at DESC");

        let invoices: Vec<Invoice> = builder.build_query_as().fetch_all(&self.pool).await?;

        let today = Utc::now().date_naive();
        let overdue_after = config::config().billing.overdue_after_days;

        Ok(invoices
            .into_iter()
            .map(|invoice| {
                let reported = reported_status(
                    InvoiceStatus::from_string(&invoice.status),
                    invoice.period_end,
                    today,
                    overdue_after,
                );
                InvoiceSummary {
                    invoice,
                    reported_status: reported.as_str().to_string(),
                }
            })
            .collect())
    }

    /// Activities already referenced by an invoice item are immutable and
    /// cannot be deleted.
    pub async fn delete_activity(
        &self,
        actor: &AuthUser,
        activity_id: Uuid,
    ) -> Result<(), ServiceError> {
        let invoiced: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM invoice_items WHERE activity_id = $1)",
        )
        .bind(activity_id)
        .fetch_one(&self.pool)
        .await?;

        if invoiced {
            return Err(ServiceError::Conflict(
                "Activity has been invoiced and can no longer be deleted".to_string(),
            ));
        }

        let result = sqlx::query("DELETE FROM activities WHERE id = $1 AND org_id = $2")
            .bind(activity_id)
            .bind(actor.org_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound("Activity not found".to_string()));
        }

        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct InvoiceSummary {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub reported_status: String,
}
