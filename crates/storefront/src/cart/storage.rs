//! Where the serialized cart lives between requests.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tower_sessions::Session;

/// Fixed key the cart is stored under.
pub const CART_KEY: &str = "cart";

/// Errors reading or writing persisted cart state.
#[derive(Debug, Error)]
pub enum CartStorageError {
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Persistent storage for the serialized cart.
#[async_trait]
pub trait CartStorage: Send + Sync {
    /// Read the saved cart, if any.
    async fn load(&self) -> Result<Option<String>, CartStorageError>;

    /// Replace the saved cart.
    async fn save(&self, serialized: &str) -> Result<(), CartStorageError>;
}

/// Cart persisted in the visitor's session.
#[derive(Clone, Debug)]
pub struct SessionCartStorage {
    session: Session,
}

impl SessionCartStorage {
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }
}

#[async_trait]
impl CartStorage for SessionCartStorage {
    async fn load(&self) -> Result<Option<String>, CartStorageError> {
        Ok(self.session.get::<String>(CART_KEY).await?)
    }

    async fn save(&self, serialized: &str) -> Result<(), CartStorageError> {
        self.session.insert(CART_KEY, serialized).await?;
        Ok(())
    }
}

/// In-memory storage that records every write.
#[derive(Clone, Default)]
pub struct MemoryCartStorage {
    saved: Arc<Mutex<Option<String>>>,
    writes: Arc<Mutex<Vec<String>>>,
}

impl MemoryCartStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-seeded with a saved value.
    #[must_use]
    pub fn with_saved(serialized: impl Into<String>) -> Self {
        Self {
            saved: Arc::new(Mutex::new(Some(serialized.into()))),
            writes: Arc::default(),
        }
    }

    /// Every value passed to `save`, oldest first.
    pub async fn writes(&self) -> Vec<String> {
        self.writes.lock().await.clone()
    }

    /// The currently saved value.
    pub async fn saved(&self) -> Option<String> {
        self.saved.lock().await.clone()
    }
}

#[async_trait]
impl CartStorage for MemoryCartStorage {
    async fn load(&self) -> Result<Option<String>, CartStorageError> {
        Ok(self.saved.lock().await.clone())
    }

    async fn save(&self, serialized: &str) -> Result<(), CartStorageError> {
        *self.saved.lock().await = Some(serialized.to_string());
        self.writes.lock().await.push(serialized.to_string());
        Ok(())
    }
}
