use axum::body::Bytes;
use axum::http::HeaderMap;
use axum::response::Json;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::config;
use crate::error::ApiError;
use crate::services::payment_service::{PaymentService, RecordPaymentInput};
use crate::services::ServiceError;

const SIGNATURE_HEADER: &str = "x-webhook-signature";
const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: CheckoutSession,
}

#[derive(Debug, Deserialize)]
struct CheckoutSession {
    /// Amount in minor units (cents)
    amount_total: i64,
    #[serde(default)]
    metadata: SessionMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct SessionMetadata {
    invoice_id: Option<Uuid>,
}

/// POST /webhooks/payment-gateway - checkout-completed events recorded as
/// payments. Redelivered events are deduplicated by event id and acked, so
/// the endpoint is safe to retry from the gateway side.
pub async fn payment_gateway(headers: HeaderMap, body: Bytes) -> Result<Json<Value>, ApiError> {
    verify_signature(&headers, &body)?;

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("Malformed webhook payload: {}", e)))?;

    if event.event_type != CHECKOUT_COMPLETED {
        // Not ours to process; ack so the gateway stops retrying
        return Ok(Json(json!({ "success": true, "data": { "ignored": true } })));
    }

    let invoice_id = event.data.object.metadata.invoice_id.ok_or_else(|| {
        ApiError::bad_request("Webhook session metadata is missing invoice_id")
    })?;

    let amount = Decimal::from(event.data.object.amount_total) / Decimal::from(100);

    let service = PaymentService::new().await?;
    let input = RecordPaymentInput {
        amount,
        method: "card".to_string(),
        reference: Some(event.id.clone()),
    };

    match service.record(None, invoice_id, &input).await {
        Ok(outcome) => Ok(Json(json!({
            "success": true,
            "data": {
                "invoice": outcome.invoice,
                "balance_remaining": outcome.balance_remaining,
            }
        }))),
        // Redelivery of an event we already recorded: ack, do not double-count
        Err(ServiceError::Conflict(_)) => {
            tracing::info!(event_id = %event.id, %invoice_id, "duplicate webhook event ignored");
            Ok(Json(json!({ "success": true, "data": { "duplicate": true } })))
        }
        Err(e) => Err(e.into()),
    }
}

fn verify_signature(headers: &HeaderMap, body: &[u8]) -> Result<(), ApiError> {
    let secret = &config::config().security.webhook_secret;
    if secret.is_empty() {
        tracing::error!("webhook secret not configured");
        return Err(ApiError::service_unavailable("Webhook verification unavailable"));
    }

    let provided = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Missing webhook signature"))?;

    let provided_bytes = hex::decode(provided)
        .map_err(|_| ApiError::unauthorized("Invalid webhook signature encoding"))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| ApiError::internal_server_error("Webhook verification failed"))?;
    mac.update(body);
    let expected = mac.finalize().into_bytes();

    if expected.ct_eq(provided_bytes.as_slice()).into() {
        Ok(())
    } else {
        Err(ApiError::unauthorized("Invalid webhook signature"))
    }
}
