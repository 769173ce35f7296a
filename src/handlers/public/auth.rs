use axum::response::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{generate_jwt, verify_password, Claims, Role};
use crate::config;
use crate::database::manager::DatabaseManager;
use crate::database::models::user::User;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /auth/login - exchange credentials for a bearer JWT
pub async fn login(Json(payload): Json<LoginRequest>) -> Result<Json<Value>, ApiError> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        let mut field_errors = std::collections::HashMap::new();
        if payload.email.trim().is_empty() {
            field_errors.insert("email".to_string(), "This field is required".to_string());
        }
        if payload.password.is_empty() {
            field_errors.insert("password".to_string(), "This field is required".to_string());
        }
        return Err(ApiError::validation_error(
            "Missing credentials",
            Some(field_errors),
        ));
    }

    let pool = DatabaseManager::pool().await?;
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(payload.email.trim())
        .fetch_optional(&pool)
        .await
        .map_err(crate::database::manager::DatabaseError::from)?;

    // Same response for unknown email and wrong password
    let user = match user {
        Some(user) if verify_password(&payload.password, &user.password_hash) => user,
        _ => return Err(ApiError::unauthorized("Invalid email or password")),
    };

    let role = Role::from_string(&user.role);
    let claims = Claims::new(user.id, user.org_id, role);
    let token = generate_jwt(claims).map_err(|e| {
        tracing::error!("JWT generation failed: {}", e);
        ApiError::internal_server_error("Failed to issue token")
    })?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "token": token,
            "user": {
                "id": user.id,
                "org_id": user.org_id,
                "email": user.email,
                "role": role.as_str(),
            },
            "expires_in": config::config().security.jwt_expiry_hours * 3600,
        }
    })))
}
