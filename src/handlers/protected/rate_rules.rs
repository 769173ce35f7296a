use axum::extract::Path;
use axum::response::{IntoResponse, Json};
use axum::Extension;
use serde_json::json;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::services::rate_service::{RateService, UpsertRateRuleInput};

/// GET /api/rate-rules/default - the org-wide default rule layer
pub async fn get_default(
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let service = RateService::new().await?;
    let rule = service.get_rule(auth.org_id, None).await?;

    Ok(Json(json!({ "success": true, "data": rule })))
}

/// PUT /api/rate-rules/default - create or replace the org default (admin only)
pub async fn put_default(
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<UpsertRateRuleInput>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_admin()?;

    let service = RateService::new().await?;
    let rule = service.upsert_rule(auth.org_id, None, &payload).await?;

    Ok(Json(json!({ "success": true, "data": rule })))
}

/// GET /api/rate-rules/clients/:client_id - a client's override layer (admin only)
pub async fn get_client(
    Extension(auth): Extension<AuthUser>,
    Path(client_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_admin()?;

    let service = RateService::new().await?;
    let rule = service.get_rule(auth.org_id, Some(client_id)).await?;

    Ok(Json(json!({ "success": true, "data": rule })))
}

/// PUT /api/rate-rules/clients/:client_id - create or replace a client
/// override (admin only)
pub async fn put_client(
    Extension(auth): Extension<AuthUser>,
    Path(client_id): Path<Uuid>,
    Json(payload): Json<UpsertRateRuleInput>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_admin()?;

    let service = RateService::new().await?;
    let rule = service
        .upsert_rule(auth.org_id, Some(client_id), &payload)
        .await?;

    Ok(Json(json!({ "success": true, "data": rule })))
}
