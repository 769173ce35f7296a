use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::Extension;
use serde_json::json;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::services::rate_service::{CreateServiceTypeInput, RateService};

/// GET /api/service-types - active service types for the caller's org
pub async fn list(Extension(auth): Extension<AuthUser>) -> Result<impl IntoResponse, ApiError> {
    let service = RateService::new().await?;
    let types = service.list_service_types(auth.org_id).await?;

    Ok(Json(json!({ "success": true, "data": types })))
}

/// POST /api/service-types - create a billable offering (admin only)
pub async fn create(
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<CreateServiceTypeInput>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_admin()?;

    let service = RateService::new().await?;
    let service_type = service.create_service_type(auth.org_id, &payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": service_type })),
    ))
}

/// DELETE /api/service-types/:id - soft deactivate (admin only); historical
/// invoice items keep their reference
pub async fn deactivate(
    Extension(auth): Extension<AuthUser>,
    Path(service_type_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_admin()?;

    let service = RateService::new().await?;
    let service_type = service
        .deactivate_service_type(auth.org_id, service_type_id)
        .await?;

    Ok(Json(json!({ "success": true, "data": service_type })))
}
