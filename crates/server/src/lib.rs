pub mod extract;
pub mod handler;
pub mod middleware;

use arc_swap::ArcSwap;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{Router, middleware as axum_mw};
use graxy_core::config::Config;
use graxy_core::metrics::Metrics;
use graxy_provider::CompletionBackend;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ArcSwap<Config>>,
    pub backend: Arc<dyn CompletionBackend>,
    pub metrics: Arc<Metrics>,
}

pub fn build_router(state: AppState) -> Router {
    let body_limit_bytes = state.config.load().body_limit_bytes();

    // Ambient routes
    let public_routes = Router::new()
        .route("/health", get(handler::health::health))
        .route("/metrics", get(handler::health::metrics));

    // Chat endpoint: POST only, everything else is 405. The body bound is
    // enforced while reading, after the credential check.
    let chat_routes = Router::new()
        .route(
            "/api/chat",
            post(handler::chat::chat).fallback(handler::method_not_allowed),
        )
        .layer(DefaultBodyLimit::max(body_limit_bytes));

    // Global middleware (outer → inner): trace, cors, context, logging
    Router::new()
        .merge(public_routes)
        .merge(chat_routes)
        .fallback(handler::not_found)
        .layer(axum_mw::from_fn(
            middleware::request_logging::request_logging_middleware,
        ))
        .layer(axum_mw::from_fn(
            middleware::request_context::request_context_middleware,
        ))
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::cors::cors_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
