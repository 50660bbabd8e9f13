//! Script-tag stripping for JSON request bodies.
//!
//! Every non-empty `POST`/`PUT` body must be JSON. Each string value in it,
//! at any depth, has `<script>...</script>` elements removed before the
//! handler sees it. Bodies that are not JSON are rejected with 400.

use std::sync::LazyLock;

use axum::{
    Json,
    body::{Body, to_bytes},
    extract::Request,
    http::{Method, StatusCode, header::CONTENT_LENGTH},
    middleware::Next,
    response::{IntoResponse, Response},
};
use regex::Regex;
use serde_json::{Value, json};
use tracing::debug;

/// Largest body the sanitizer will buffer.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Matches a script element, including its content, case-insensitively.
static SCRIPT_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").expect("Invalid regex"));

/// Remove script elements from every string in a JSON value.
#[must_use]
pub fn sanitize_value(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(strip_script_tags(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_value).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (key, sanitize_value(value)))
                .collect(),
        ),
        other => other,
    }
}

fn strip_script_tags(s: &str) -> String {
    SCRIPT_TAG_RE.replace_all(s, "").into_owned()
}

fn invalid_payload() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "Invalid JSON payload" })),
    )
        .into_response()
}

/// Sanitize JSON bodies of `POST` and `PUT` requests.
pub async fn sanitize_json_middleware(request: Request, next: Next) -> Response {
    if !matches!(*request.method(), Method::POST | Method::PUT) {
        return next.run(request).await;
    }

    let (mut parts, body) = request.into_parts();
    let Ok(bytes) = to_bytes(body, MAX_BODY_BYTES).await else {
        return invalid_payload();
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return next.run(Request::from_parts(parts, Body::from(bytes))).await;
    }

    let Ok(value) = serde_json::from_slice::<Value>(&bytes) else {
        debug!("Rejecting non-JSON request body");
        return invalid_payload();
    };

    let Ok(sanitized) = serde_json::to_vec(&sanitize_value(value)) else {
        return invalid_payload();
    };

    parts.headers.remove(CONTENT_LENGTH);
    next.run(Request::from_parts(parts, Body::from(sanitized)))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_script_elements() {
        assert_eq!(
            strip_script_tags("Hi<script>alert(1)</script> there"),
            "Hi there"
        );
        assert_eq!(
            strip_script_tags("<SCRIPT type=\"text/javascript\">\nx()\n</Script>ok"),
            "ok"
        );
        assert_eq!(strip_script_tags("a < b and <b>bold</b>"), "a < b and <b>bold</b>");
    }

    #[test]
    fn test_sanitizes_nested_values() {
        let input = json!({
            "customerInfo": { "firstName": "Ali<script>x</script>" },
            "items": [{ "name": "<script>y</script>Shirt", "quantity": 2 }],
            "isPaid": false
        });

        let output = sanitize_value(input);
        assert_eq!(output["customerInfo"]["firstName"], "Ali");
        assert_eq!(output["items"][0]["name"], "Shirt");
        assert_eq!(output["items"][0]["quantity"], 2);
        assert_eq!(output["isPaid"], false);
    }
}
