//! Content webhook receiver.
//!
//! The CMS posts `{action, post_id, post_type}` when content changes. An
//! updated product drops its cached copies so the next read goes upstream.

use axum::{Json, body::Bytes, extract::State, http::HeaderMap};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{Value, json};
use sha2::Sha256;
use threadline_core::ProductId;
use tracing::{debug, info, instrument, warn};

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Header carrying the base64 HMAC-SHA256 of the raw body.
pub const SIGNATURE_HEADER: &str = "x-wc-webhook-signature";

type HmacSha256 = Hmac<Sha256>;

/// Webhook payload.
#[derive(Debug, Deserialize)]
pub struct ContentEvent {
    pub action: String,
    /// Sent as a number or a numeric string.
    #[serde(default)]
    pub post_id: Value,
    pub post_type: String,
}

impl ContentEvent {
    fn product_id(&self) -> Option<ProductId> {
        match &self.post_id {
            Value::Number(n) => n.as_i64().map(ProductId::new),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

/// Check `signature` against the HMAC of `body`.
///
/// Comparison goes through `Mac::verify_slice`, which is constant-time.
#[must_use]
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = BASE64.decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Base64 HMAC-SHA256 of `body`, as the CMS computes it.
#[must_use]
pub fn sign(secret: &str, body: &[u8]) -> String {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(body);
    BASE64.encode(mac.finalize().into_bytes())
}

/// POST /api/webhooks/wordpress
///
/// When `WEBHOOK_SECRET` is configured the signature header is required.
#[instrument(skip_all)]
pub async fn wordpress(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    if let Some(secret) = &state.config().webhook_secret {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !verify_signature(secret.expose_secret(), &body, signature) {
            warn!("Rejecting webhook with bad signature");
            return Err(AppError::Unauthorized("Invalid webhook signature".to_string()));
        }
    }

    let event: ContentEvent = serde_json::from_slice(&body).map_err(|e| {
        debug!(error = %e, "Malformed webhook payload");
        AppError::BadRequest("Invalid webhook".to_string())
    })?;

    if event.action == "updated" && event.post_type == "product" {
        match event.product_id() {
            Some(id) => {
                state.catalog().invalidate_product(id).await;
                info!(product_id = %id, "Product cache invalidated");
            }
            None => warn!(post_id = %event.post_id, "Product webhook without a usable id"),
        }
    } else {
        debug!(action = %event.action, post_type = %event.post_type, "Ignoring webhook");
    }

    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_roundtrip() {
        let body = br#"{"action":"updated","post_id":3,"post_type":"product"}"#;
        let signature = sign("s3cret-value", body);
        assert!(verify_signature("s3cret-value", body, &signature));
    }

    #[test]
    fn test_signature_rejects_tampered_body() {
        let signature = sign("s3cret-value", b"original");
        assert!(!verify_signature("s3cret-value", b"tampered", &signature));
    }

    #[test]
    fn test_signature_rejects_garbage() {
        assert!(!verify_signature("s3cret-value", b"body", "not base64!!"));
        assert!(!verify_signature("s3cret-value", b"body", ""));
    }

    #[test]
    fn test_post_id_number_or_string() {
        let numeric: ContentEvent =
            serde_json::from_str(r#"{"action":"updated","post_id":42,"post_type":"product"}"#)
                .unwrap();
        assert_eq!(numeric.product_id(), Some(ProductId::new(42)));

        let text: ContentEvent =
            serde_json::from_str(r#"{"action":"updated","post_id":"42","post_type":"product"}"#)
                .unwrap();
        assert_eq!(text.product_id(), Some(ProductId::new(42)));

        let missing: ContentEvent =
            serde_json::from_str(r#"{"action":"updated","post_type":"product"}"#).unwrap();
        assert_eq!(missing.product_id(), None);
    }
}
