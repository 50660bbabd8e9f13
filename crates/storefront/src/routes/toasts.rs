//! Toast route handlers.

use axum::{Json, extract::Path, http::StatusCode};
use chrono::Utc;
use tower_sessions::Session;
use uuid::Uuid;

use crate::toast::{Toast, ToastStore};

/// Active toasts. Expired ones are pruned from the session.
pub async fn list(session: Session) -> Json<Vec<Toast>> {
    let mut store = ToastStore::load(&session).await;
    let before = store.len();
    let active = store.active(Utc::now()).to_vec();
    if store.len() != before {
        store.save(&session).await;
    }
    Json(active)
}

/// Dismiss a toast. Unknown ids are a no-op.
pub async fn dismiss(session: Session, Path(id): Path<Uuid>) -> StatusCode {
    let mut store = ToastStore::load(&session).await;
    if store.remove(id) {
        store.save(&session).await;
    }
    StatusCode::NO_CONTENT
}
