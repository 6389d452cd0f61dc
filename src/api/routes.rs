use axum::{middleware, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{make_span_with_request_id, request_id_middleware};

use super::handlers;
use super::AppState;

/// Creates the add-on router with all routes
///
/// Path parameters arrive with their `.json` suffix; handlers strip it.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/manifest.json", get(handlers::manifest))
        .route("/catalog/:type/:id", get(handlers::catalog))
        .route("/catalog/:type/:id/:extra", get(handlers::catalog_with_extra))
        .route("/meta/:type/:id", get(handlers::meta))
        .route("/stream/:type/:id", get(handlers::stream))
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
