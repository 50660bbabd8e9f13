//! Database operations for storefront `PostgreSQL`.
//!
//! The commerce platform is the source of truth for products and orders.
//! The only local data is the pending-order ledger used to reconcile
//! payments that were taken before their order was recorded upstream.
//!
//! ## Tables
//!
//! - `storefront.pending_order` - Orders awaiting confirmation upstream
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p threadline-cli -- migrate
//! ```

pub mod pending_orders;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use pending_orders::{
    MemoryPendingOrderStore, PendingOrder, PendingOrderStore, PgPendingOrderStore, claim_deadline,
};

/// Errors from repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Query failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Row does not exist.
    #[error("Not found")]
    NotFound,

    /// Unique constraint or state conflict.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Stored data could not be decoded.
    #[error("Data corruption: {0}")]
    DataCorruption(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
