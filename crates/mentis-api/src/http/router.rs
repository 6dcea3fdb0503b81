//! Axum router configuration with middleware.
//!
//! All REST routes are under `/v1/`. Middleware: CORS and request tracing.

use axum::Router;
use axum::routing::{delete, get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let v1 = Router::new()
        // Cache
        .route("/cache/publish", post(handlers::cache::publish))
        .route("/cache/lookup", post(handlers::cache::lookup))
        .route("/cache/artifacts/{id}", get(handlers::cache::get_artifact))
        .route(
            "/cache/artifacts/{id}",
            delete(handlers::cache::delete_artifact),
        )
        .route("/cache/invalidate", post(handlers::cache::invalidate))
        // Quick lookup for GET requests
        .route("/lookup", get(handlers::cache::quick_lookup))
        // Workflow
        .route(
            "/workflow/sessions",
            post(handlers::workflow::create_session),
        )
        .route(
            "/workflow/sessions/{id}",
            get(handlers::workflow::get_session),
        )
        .route(
            "/workflow/sessions/{id}/complete",
            post(handlers::workflow::complete_session),
        )
        .route(
            "/workflow/sessions/{id}/fail",
            post(handlers::workflow::fail_session),
        )
        .route("/workflow/steps", post(handlers::workflow::execute_step))
        .route(
            "/workflow/steps/lookup",
            post(handlers::workflow::lookup_step),
        );

    Router::new()
        .nest("/v1", v1)
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Simple health check endpoint.
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "healthy",
        "service": "mentis",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
