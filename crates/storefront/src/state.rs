//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::cache::{CachedCatalog, ReadThroughCache};
use crate::checkout::CheckoutOrchestrator;
use crate::commerce::{CommerceClient, OrderBackend};
use crate::config::StorefrontConfig;
use crate::db::{MemoryPendingOrderStore, PendingOrderStore, PgPendingOrderStore};
use crate::payments::{PaymentProcessor, StripeClient};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like upstream clients and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: Option<PgPool>,
    catalog: CachedCatalog,
    orders: Arc<dyn OrderBackend>,
    payments: Arc<dyn PaymentProcessor>,
    pending: Arc<dyn PendingOrderStore>,
    checkout: CheckoutOrchestrator,
}

impl AppState {
    /// Assemble state from already-built collaborators.
    #[must_use]
    pub fn new(
        config: StorefrontConfig,
        pool: Option<PgPool>,
        catalog: CachedCatalog,
        payments: Arc<dyn PaymentProcessor>,
        pending: Arc<dyn PendingOrderStore>,
    ) -> Self {
        let orders: Arc<dyn OrderBackend> = Arc::new(catalog.client().clone());
        let checkout = CheckoutOrchestrator::new(
            Arc::clone(&payments),
            Arc::clone(&orders),
            Arc::clone(&pending),
            config.currency,
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                catalog,
                orders,
                payments,
                pending,
                checkout,
            }),
        }
    }

    /// Build state from configuration.
    ///
    /// The pending-order ledger lives in `PostgreSQL` when a pool is given
    /// and in process memory otherwise.
    pub async fn from_config(config: StorefrontConfig, pool: Option<PgPool>) -> Self {
        let client = CommerceClient::new(&config.commerce);
        let cache = ReadThroughCache::from_config(&config.cache).await;
        let catalog = CachedCatalog::new(client, cache);
        let payments: Arc<dyn PaymentProcessor> = Arc::new(StripeClient::new(&config.payments));

        let pending: Arc<dyn PendingOrderStore> = match &pool {
            Some(pool) => Arc::new(PgPendingOrderStore::new(pool.clone())),
            None => {
                tracing::warn!("No database configured, pending orders are kept in memory");
                Arc::new(MemoryPendingOrderStore::new())
            }
        };

        Self::new(config, pool, catalog, payments, pending)
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get the database connection pool, if one is configured.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }

    /// Get the cached catalog.
    #[must_use]
    pub fn catalog(&self) -> &CachedCatalog {
        &self.inner.catalog
    }

    /// Get the order backend.
    #[must_use]
    pub fn orders(&self) -> &Arc<dyn OrderBackend> {
        &self.inner.orders
    }

    /// Get the payment processor.
    #[must_use]
    pub fn payments(&self) -> &Arc<dyn PaymentProcessor> {
        &self.inner.payments
    }

    /// Get the pending-order ledger.
    #[must_use]
    pub fn pending_orders(&self) -> &Arc<dyn PendingOrderStore> {
        &self.inner.pending
    }

    /// Get the checkout orchestrator.
    #[must_use]
    pub fn checkout(&self) -> &CheckoutOrchestrator {
        &self.inner.checkout
    }
}
