//! Transient user-facing notifications.
//!
//! Toasts live in the visitor's session. Each has a lifetime in
//! milliseconds (`0` = stays until dismissed) and is dropped by
//! [`ToastStore::active`] once expired.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::warn;
use uuid::Uuid;

/// Session key for the toast list.
pub const TOASTS_KEY: &str = "toasts";

/// Default lifetime of a toast.
pub const DEFAULT_DURATION_MS: u64 = 5000;

/// Visual kind of a toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    Success,
    Error,
    #[default]
    Info,
}

/// A single notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub id: Uuid,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: ToastKind,
    pub duration_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl Toast {
    fn expired(&self, now: DateTime<Utc>) -> bool {
        if self.duration_ms == 0 {
            return false;
        }
        let lifetime = Duration::milliseconds(i64::try_from(self.duration_ms).unwrap_or(i64::MAX));
        now.signed_duration_since(self.created_at) >= lifetime
    }
}

/// Ordered list of toasts, newest last.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToastStore {
    toasts: Vec<Toast>,
}

impl ToastStore {
    #[must_use]
    pub const fn new() -> Self {
        Self { toasts: Vec::new() }
    }

    /// Push a toast and return its id.
    pub fn add(&mut self, message: impl Into<String>, kind: ToastKind, duration_ms: Option<u64>) -> Uuid {
        self.add_at(message, kind, duration_ms, Utc::now())
    }

    fn add_at(
        &mut self,
        message: impl Into<String>,
        kind: ToastKind,
        duration_ms: Option<u64>,
        now: DateTime<Utc>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.toasts.push(Toast {
            id,
            message: message.into(),
            kind,
            duration_ms: duration_ms.unwrap_or(DEFAULT_DURATION_MS),
            created_at: now,
        });
        id
    }

    /// Dismiss a toast. Returns whether it existed.
    pub fn remove(&mut self, id: Uuid) -> bool {
        let before = self.toasts.len();
        self.toasts.retain(|toast| toast.id != id);
        self.toasts.len() != before
    }

    /// Drop expired toasts and return the rest.
    pub fn active(&mut self, now: DateTime<Utc>) -> &[Toast] {
        self.toasts.retain(|toast| !toast.expired(now));
        &self.toasts
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.toasts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.toasts.is_empty()
    }

    /// Load toasts from the session; unreadable state is an empty list.
    pub async fn load(session: &Session) -> Self {
        match session.get::<Self>(TOASTS_KEY).await {
            Ok(store) => store.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Failed to read toasts from session");
                Self::new()
            }
        }
    }

    /// Write toasts back to the session. Failures are logged.
    pub async fn save(&self, session: &Session) {
        if let Err(e) = session.insert(TOASTS_KEY, self).await {
            warn!(error = %e, "Failed to save toasts to session");
        }
    }

    /// Load, push one toast, save.
    pub async fn push(session: &Session, message: impl Into<String>, kind: ToastKind) {
        let mut store = Self::load(session).await;
        store.add(message, kind, None);
        store.save(session).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_uses_default_duration() {
        let mut store = ToastStore::new();
        store.add("Added to cart", ToastKind::Success, None);
        assert_eq!(store.active(Utc::now())[0].duration_ms, 5000);
    }

    #[test]
    fn test_expired_toasts_are_pruned() {
        let mut store = ToastStore::new();
        let start = Utc::now();
        store.add_at("short", ToastKind::Info, Some(1000), start);
        store.add_at("long", ToastKind::Info, Some(10_000), start);
        store.add_at("sticky", ToastKind::Error, Some(0), start);

        let later = start + Duration::seconds(5);
        let remaining: Vec<_> = store.active(later).iter().map(|t| t.message.as_str()).collect();
        assert_eq!(remaining, vec!["long", "sticky"]);

        let much_later = start + Duration::days(1);
        assert_eq!(store.active(much_later).len(), 1);
    }

    #[test]
    fn test_remove() {
        let mut store = ToastStore::new();
        let id = store.add("bye", ToastKind::Info, None);
        assert!(store.remove(id));
        assert!(!store.remove(id));
        assert!(store.is_empty());
    }

    #[test]
    fn test_serialized_kind_field_is_type() {
        let mut store = ToastStore::new();
        store.add("oops", ToastKind::Error, None);
        let json = serde_json::to_value(&store).unwrap_or_default();
        assert_eq!(json[0]["type"], "error");
    }
}
