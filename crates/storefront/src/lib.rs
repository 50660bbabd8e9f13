//! Threadline Storefront library.
//!
//! This crate provides the storefront functionality as a library,
//! allowing it to be tested and reused.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod cart;
pub mod checkout;
pub mod commerce;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod payments;
pub mod reconcile;
pub mod routes;
pub mod state;
pub mod toast;

use axum::{Router, middleware::from_fn, middleware::from_fn_with_state};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the complete application router.
///
/// Layer order, outermost first: tracing, request id, security headers,
/// CORS, session, then on `/api` only the origin check, rate limiter and (for
/// everything but webhooks) JSON sanitization. Sentry layers are added by
/// the binary.
pub fn app(state: AppState) -> Router {
    let session_layer = middleware::create_session_layer(state.config());
    let cors = middleware::cors_layer(state.config());

    let api = routes::api_routes()
        .layer(from_fn(middleware::sanitize_json_middleware))
        .merge(routes::webhook_routes())
        .layer(middleware::api_rate_limiter())
        .layer(from_fn(middleware::rate_limit_response_middleware))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::origin_check_middleware,
        ));

    Router::new()
        .merge(routes::health_routes())
        .nest("/api", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(from_fn(middleware::request_id_middleware))
                .layer(from_fn(middleware::security_headers_middleware))
                .layer(cors)
                .layer(session_layer),
        )
        .with_state(state)
}
