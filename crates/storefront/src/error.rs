//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers return `Result<T, AppError>`
//! and every error body is JSON: `{"error": "..."}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::checkout::CheckoutError;
use crate::commerce::CommerceError;
use crate::db::RepositoryError;
use crate::payments::PaymentError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Commerce API operation failed.
    #[error("Commerce error: {0}")]
    Commerce(#[from] CommerceError),

    /// Payment processor operation failed.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Checkout precondition failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// An upstream write failed; the message is safe to show.
    #[error("{0}")]
    Upstream(&'static str),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request signature missing or wrong.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Session(_) | Self::Internal(_) | Self::Upstream(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Commerce(err) => commerce_status(err),
            Self::Payment(err) => payment_status(err),
            Self::Checkout(err) => match err {
                CheckoutError::EmptyCart
                | CheckoutError::MissingFields(_)
                | CheckoutError::WrongPaymentMethod(_)
                | CheckoutError::IntentMismatch => StatusCode::BAD_REQUEST,
                CheckoutError::SubmissionInProgress | CheckoutError::InvalidStep { .. } => {
                    StatusCode::CONFLICT
                }
                CheckoutError::Payment(err) => payment_status(err),
                CheckoutError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Message shown to the client. Internal detail is never exposed.
    fn public_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            Self::Upstream(message) => (*message).to_string(),
            Self::Commerce(err) => match err {
                err if err.is_not_found() => "Not found".to_string(),
                CommerceError::RateLimited(_) => "Too many requests".to_string(),
                _ => "External service error".to_string(),
            },
            Self::Payment(err) | Self::Checkout(CheckoutError::Payment(err)) => match err {
                PaymentError::InvalidIntentId(_) => "Invalid payment intent".to_string(),
                PaymentError::NotConfigured => "Card payments are unavailable".to_string(),
                _ => "Payment service error".to_string(),
            },
            Self::Checkout(CheckoutError::Repository(_)) => "Internal server error".to_string(),
            Self::Checkout(err) => err.to_string(),
            Self::NotFound(what) => format!("Not found: {what}"),
            Self::Unauthorized(msg) | Self::BadRequest(msg) => msg.clone(),
            Self::RateLimited => "Too many requests".to_string(),
        }
    }
}

const fn commerce_status(err: &CommerceError) -> StatusCode {
    match err {
        CommerceError::Api { status: 404, .. } => StatusCode::NOT_FOUND,
        CommerceError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        _ => StatusCode::BAD_GATEWAY,
    }
}

const fn payment_status(err: &PaymentError) -> StatusCode {
    match err {
        PaymentError::InvalidIntentId(_) => StatusCode::BAD_REQUEST,
        PaymentError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let body = Json(json!({ "error": self.public_message() }));
        (status, body).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for visitor actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added product", Some(&[("product_id", "3")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
