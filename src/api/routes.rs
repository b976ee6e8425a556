//! API Routes
//!
//! Configures the Axum router with all cache server endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    delete_handler, exists_handler, flush_handler, get_handler, health_handler, remember_handler,
    set_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health` - Backend name and connectivity
/// - `PUT /cache/:key` - Store a value (`{"value": ..., "ttl": 60}`)
/// - `GET /cache/:key` - Retrieve a value
/// - `DELETE /cache/:key` - Delete a value
/// - `GET /cache/:key/exists` - Check for a live value
/// - `POST /cache/:key/remember` - Read-through store
/// - `DELETE /cache` - Flush everything
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/cache", delete(flush_handler))
        .route(
            "/cache/:key",
            get(get_handler).put(set_handler).delete(delete_handler),
        )
        .route("/cache/:key/exists", get(exists_handler))
        .route("/cache/:key/remember", post(remember_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
