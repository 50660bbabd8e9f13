//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Security headers
//! 5. CORS (allowed origins)
//! 6. Session layer (tower-sessions, in-memory store)
//! 7. Origin check, rate limiting and JSON sanitization on `/api`

pub mod rate_limit;
pub mod request_id;
pub mod sanitize;
pub mod security_headers;
pub mod session;

use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

pub use rate_limit::{api_rate_limiter, rate_limit_response_middleware};
pub use request_id::request_id_middleware;
pub use sanitize::sanitize_json_middleware;
pub use security_headers::{origin_check_middleware, security_headers_middleware};
pub use session::create_session_layer;

use crate::config::StorefrontConfig;

/// CORS layer allowing the configured origins.
#[must_use]
pub fn cors_layer(config: &StorefrontConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            HeaderName::from_static("x-requested-with"),
        ])
        .max_age(std::time::Duration::from_secs(86_400))
}
