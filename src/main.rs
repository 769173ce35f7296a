use axum::{middleware as axum_middleware, routing::get, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use elderflow_api::database::manager::DatabaseManager;
use elderflow_api::handlers;
use elderflow_api::middleware::auth::jwt_auth_middleware;

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "elderflow_api=info,tower_http=info".into()),
        )
        .init();

    let config = elderflow_api::config::config();
    tracing::info!("Starting ElderFlow API in {:?} mode", config.environment);

    if let Err(e) = DatabaseManager::run_migrations().await {
        // The server still comes up; /health reports the database as degraded
        tracing::warn!("migrations not applied: {}", e);
    }

    let app = app();

    // Allow tests or deployments to override port via env
    let port = std::env::var("ELDERFLOW_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    tracing::info!("ElderFlow API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}

fn app() -> Router {
    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(public_routes())
        // Protected API behind bearer-JWT middleware
        .merge(protected_routes())
        // Global middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn public_routes() -> Router {
    use axum::routing::post;
    use handlers::public::{auth, webhooks};

    Router::new()
        .route("/auth/login", post(auth::login))
        .route("/webhooks/payment-gateway", post(webhooks::payment_gateway))
}

fn protected_routes() -> Router {
    use axum::routing::{delete, post};
    use handlers::protected::{activities, invoices, rate_rules, service_types};

    Router::new()
        // Invoice lifecycle
        .route("/api/invoices", get(invoices::list))
        .route("/api/invoices/generate", post(invoices::generate))
        .route("/api/invoices/:id", get(invoices::get))
        .route("/api/invoices/:id/approve", post(invoices::approve))
        .route("/api/invoices/:id/mark-paid", post(invoices::mark_paid))
        // Rate configuration
        .route(
            "/api/rate-rules/default",
            get(rate_rules::get_default).put(rate_rules::put_default),
        )
        .route(
            "/api/rate-rules/clients/:client_id",
            get(rate_rules::get_client).put(rate_rules::put_client),
        )
        // Service types
        .route(
            "/api/service-types",
            get(service_types::list).post(service_types::create),
        )
        .route("/api/service-types/:id", delete(service_types::deactivate))
        // Activities are immutable once invoiced; delete enforces that
        .route("/api/activities/:id", delete(activities::delete))
        .layer(axum_middleware::from_fn(jwt_auth_middleware))
}

async fn root() -> axum::response::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    axum::response::Json(json!({
        "success": true,
        "data": {
            "name": "ElderFlow API",
            "version": version,
            "description": "Home-care billing backend: rate resolution, invoice generation, payment ledger",
            "endpoints": {
                "home": "/ (public)",
                "auth": "/auth/login (public - token acquisition)",
                "webhooks": "/webhooks/payment-gateway (public - signed)",
                "invoices": "/api/invoices[...] (protected)",
                "rate_rules": "/api/rate-rules/* (protected)",
                "service_types": "/api/service-types (protected)",
            }
        }
    }))
}

async fn health() -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check().await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            axum::response::Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            axum::response::Json(json!({
                "success": false,
                "error": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string()
                }
            })),
        ),
    }
}
