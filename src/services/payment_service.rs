use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::billing::ledger::settle;
use crate::database::manager::DatabaseManager;
use crate::database::models::invoice::{Invoice, InvoiceStatus};
use crate::database::models::payment::{Payment, PAYMENT_STATUS_COMPLETED};

use super::ServiceError;

#[derive(Debug, Deserialize)]
pub struct RecordPaymentInput {
    pub amount: Decimal,
    pub method: String,
    pub reference: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaymentOutcome {
    pub invoice: Invoice,
    pub payment: Payment,
    pub total_paid: Decimal,
    pub balance_remaining: Decimal,
}

pub struct PaymentService {
    pool: PgPool,
}

impl PaymentService {
    pub async fn new() -> Result<Self, ServiceError> {
        Ok(Self {
            pool: DatabaseManager::pool().await?,
        })
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record a completed payment against an invoice and rewrite the
    /// invoice's derived status. The payment insert, the paid-sum
    /// recomputation, and the status update happen in one transaction; the
    /// invoice row is locked for the duration so concurrent payments
    /// serialize. Both the admin mark-paid endpoint and the gateway webhook
    /// land here, so the draft-bump policy is identical for both.
    ///
    /// `org_id` is Some for authenticated callers (tenant scoping) and None
    /// for the webhook, which is trusted after signature verification and
    /// addresses the invoice directly by id.
    pub async fn record(
        &self,
        org_id: Option<Uuid>,
        invoice_id: Uuid,
        input: &RecordPaymentInput,
    ) -> Result<PaymentOutcome, ServiceError> {
        validate_input(input)?;

        let mut tx = self.pool.begin().await?;

        let invoice = match org_id {
            Some(org_id) => {
                sqlx::query_as::<_, Invoice>(
                    "SELECT * FROM invoices WHERE id = $1 AND org_id = $2 FOR UPDATE",
                )
                .bind(invoice_id)
                .bind(org_id)
                .fetch_optional(&mut *tx)
                .await?
            }
            None => {
                sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = $1 FOR UPDATE")
                    .bind(invoice_id)
                    .fetch_optional(&mut *tx)
                    .await?
            }
        }
        .ok_or_else(|| ServiceError::NotFound("Invoice not found".to_string()))?;

        // Duplicate external references (gateway event ids) must not
        // double-count; the partial unique index backs this check up under
        // concurrency.
        if let Some(reference) = &input.reference {
            let duplicate: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM payments WHERE invoice_id = $1 AND reference = $2)",
            )
            .bind(invoice.id)
            .bind(reference)
            .fetch_one(&mut *tx)
            .await?;

            if duplicate {
                return Err(ServiceError::Conflict(format!(
                    "A payment with reference '{}' was already recorded for this invoice",
                    reference
                )));
            }
        }

        let now = Utc::now();
        let insert_result = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (org_id, invoice_id, amount, method, status, reference, paid_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(invoice.org_id)
        .bind(invoice.id)
        .bind(input.amount)
        .bind(&input.method)
        .bind(PAYMENT_STATUS_COMPLETED)
        .bind(&input.reference)
        .bind(now)
        .fetch_one(&mut *tx)
        .await;

        let payment = match insert_result {
            Ok(payment) => payment,
            Err(e) if super::is_unique_violation(&e) => {
                return Err(ServiceError::Conflict(
                    "A payment with this reference was already recorded for this invoice"
                        .to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        let total_paid: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM payments WHERE invoice_id = $1 AND status = $2",
        )
        .bind(invoice.id)
        .bind(PAYMENT_STATUS_COMPLETED)
        .fetch_one(&mut *tx)
        .await?;

        let outcome = settle(
            invoice.total_amount,
            total_paid,
            InvoiceStatus::from_string(&invoice.status),
            invoice.paid_at,
            now,
        );

        let invoice = sqlx::query_as::<_, Invoice>(
            "UPDATE invoices SET status = $2, paid_at = $3 WHERE id = $1 RETURNING *",
        )
        .bind(invoice.id)
        .bind(outcome.status.as_str())
        .bind(outcome.paid_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            invoice_id = %invoice.id,
            payment_id = %payment.id,
            amount = %payment.amount,
            total_paid = %total_paid,
            status = %invoice.status,
            "payment recorded"
        );

        Ok(PaymentOutcome {
            invoice,
            payment,
            total_paid,
            balance_remaining: outcome.balance_remaining,
        })
    }
}

fn validate_input(input: &RecordPaymentInput) -> Result<(), ServiceError> {
    let mut field_errors = std::collections::HashMap::new();

    if input.amount <= Decimal::ZERO {
        field_errors.insert(
            "amount".to_string(),
            "amount must be greater than zero".to_string(),
        );
    }
    if input.method.trim().is_empty() {
        field_errors.insert("method".to_string(), "method must not be empty".to_string());
    }

    if field_errors.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::FieldValidation {
            message: "Invalid payment input".to_string(),
            field_errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rejects_non_positive_amount_and_blank_method() {
        let err = validate_input(&RecordPaymentInput {
            amount: dec!(0),
            method: "  ".to_string(),
            reference: None,
        })
        .unwrap_err();

        match err {
            ServiceError::FieldValidation { field_errors, .. } => {
                assert!(field_errors.contains_key("amount"));
                assert!(field_errors.contains_key("method"));
            }
            other => panic!("expected FieldValidation, got {other:?}"),
        }
    }

    #[test]
    fn accepts_valid_input() {
        assert!(validate_input(&RecordPaymentInput {
            amount: dec!(120.00),
            method: "card".to_string(),
            reference: Some("evt_123".to_string()),
        })
        .is_ok());
    }
}
