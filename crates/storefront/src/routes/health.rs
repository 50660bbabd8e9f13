//! Liveness and readiness checks.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::state::AppState;

/// Per-dependency readiness report.
#[derive(Debug, Serialize)]
pub struct Readiness {
    /// `None` when no database is configured.
    pub database: Option<bool>,
    /// `None` when the cache backend has no remote to ping.
    pub cache: Option<bool>,
}

impl Readiness {
    fn is_ready(&self) -> bool {
        self.database != Some(false) && self.cache != Some(false)
    }
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Pings the database (when configured) and the cache backend. Returns
/// 503 Service Unavailable if either is unreachable.
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<Readiness>) {
    let database = match state.pool() {
        Some(pool) => Some(sqlx::query("SELECT 1").fetch_one(pool).await.is_ok()),
        None => None,
    };
    let cache = state.catalog().cache().ping().await;

    let report = Readiness { database, cache };
    let status = if report.is_ready() {
        StatusCode::OK
    } else {
        tracing::warn!(?report, "Readiness check failed");
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}
