use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::Extension;
use serde_json::json;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::services::invoice_service::{
    GenerateInvoiceRequest, InvoiceService, ListInvoicesFilter,
};
use crate::services::payment_service::{PaymentService, RecordPaymentInput};

/// POST /api/invoices/generate - price a client's activities for a period
/// into a draft invoice (admin only)
pub async fn generate(
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<GenerateInvoiceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_admin()?;

    let service = InvoiceService::new().await?;
    let result = service.generate(&auth, &payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": result })),
    ))
}

/// GET /api/invoices - org-scoped listing; care managers see only their
/// clients' invoices
pub async fn list(
    Extension(auth): Extension<AuthUser>,
    Query(filter): Query<ListInvoicesFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let service = InvoiceService::new().await?;
    let invoices = service.list(&auth, &filter).await?;

    Ok(Json(json!({ "success": true, "data": invoices })))
}

/// GET /api/invoices/:id - invoice with items, payments, total paid, balance
pub async fn get(
    Extension(auth): Extension<AuthUser>,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let service = InvoiceService::new().await?;
    let detail = service.get(&auth, invoice_id).await?;

    Ok(Json(json!({ "success": true, "data": detail })))
}

/// POST /api/invoices/:id/approve - draft -> sent (admin only)
pub async fn approve(
    Extension(auth): Extension<AuthUser>,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_admin()?;

    let service = InvoiceService::new().await?;
    let invoice = service.approve(&auth, invoice_id).await?;

    Ok(Json(json!({ "success": true, "data": invoice })))
}

/// POST /api/invoices/:id/mark-paid - record a manual payment (admin only)
pub async fn mark_paid(
    Extension(auth): Extension<AuthUser>,
    Path(invoice_id): Path<Uuid>,
    Json(payload): Json<RecordPaymentInput>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_admin()?;

    let service = PaymentService::new().await?;
    let outcome = service.record(Some(auth.org_id), invoice_id, &payload).await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "invoice": outcome.invoice,
            "payment": outcome.payment,
            "total_paid": outcome.total_paid,
            "balance_remaining": outcome.balance_remaining,
        }
    })))
}
