use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// Multipart framing allowance on top of the clip itself.
const MULTIPART_OVERHEAD: usize = 16 * 1024;

/// Build the axum router with all VDL endpoints.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.upload.max_bytes.saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/info", get(handler::info_handler))
        .route("/v1/upload", post(handler::upload_handler))
        .route("/v1/chain", get(handler::chain_handler))
        .route("/v1/chain/:index", get(handler::block_handler))
        .route("/v1/verify", get(handler::verify_handler))
        .route("/v1/summary", get(handler::summary_handler))
        .route("/v1/logs", get(handler::logs_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(body_limit))
                .layer(RequestBodyLimitLayer::new(body_limit)),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
