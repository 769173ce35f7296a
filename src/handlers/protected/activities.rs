use axum::extract::Path;
use axum::response::{IntoResponse, Json};
use axum::Extension;
use serde_json::json;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::auth::AuthUser;
use crate::services::invoice_service::InvoiceService;

/// DELETE /api/activities/:id - delete an activity (admin only). Rejected
/// with 409 once any invoice item references it.
pub async fn delete(
    Extension(auth): Extension<AuthUser>,
    Path(activity_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_admin()?;

    let service = InvoiceService::new().await?;
    service.delete_activity(&auth, activity_id).await?;

    Ok(Json(json!({ "success": true, "data": { "deleted": true } })))
}
