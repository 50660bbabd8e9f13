//! Persisted cart store.
//!
//! [`CartStore`] owns the current cart snapshot for one visitor and writes
//! every change through to [`CartStorage`]. Writes are gated on an explicit
//! hydration flag: until the saved cart has been loaded, nothing is
//! persisted, so the empty starting state can never overwrite a saved cart.

mod demo;
mod storage;

use std::sync::Arc;

use rust_decimal::Decimal;
use threadline_core::{Cart, CartLineItem, ProductId, ProductInfo};
use tracing::{debug, warn};

pub use demo::DemoCatalog;
pub use storage::{CART_KEY, CartStorage, CartStorageError, MemoryCartStorage, SessionCartStorage};

/// Cart state container for one visitor.
pub struct CartStore<S> {
    storage: S,
    cart: Arc<Cart>,
    hydrated: bool,
}

impl<S: CartStorage> CartStore<S> {
    /// Empty, unhydrated store.
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            cart: Arc::new(Cart::new()),
            hydrated: false,
        }
    }

    /// Create a store and load the saved cart.
    pub async fn open(storage: S) -> Self {
        let mut store = Self::new(storage);
        store.hydrate().await;
        store
    }

    /// Load the saved cart, replacing the in-memory state.
    ///
    /// Malformed or unreadable saved data is logged and treated as an empty
    /// cart. Calling this twice is a no-op.
    pub async fn hydrate(&mut self) -> Arc<Cart> {
        if self.hydrated {
            return self.snapshot();
        }

        let loaded = match self.storage.load().await {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<CartLineItem>>(&raw) {
                Ok(items) => Cart::from_items(items),
                Err(e) => {
                    warn!(error = %e, "Failed to load cart, starting empty");
                    Cart::new()
                }
            },
            Ok(None) => Cart::new(),
            Err(e) => {
                warn!(error = %e, "Cart storage unreadable, starting empty");
                Cart::new()
            }
        };

        self.cart = Arc::new(loaded);
        self.hydrated = true;
        self.snapshot()
    }

    #[must_use]
    pub const fn is_hydrated(&self) -> bool {
        self.hydrated
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Cart> {
        Arc::clone(&self.cart)
    }

    /// Add a demo catalog product by id. Unknown ids are ignored.
    pub async fn add_by_id(&mut self, product_id: ProductId, quantity: i64) -> Arc<Cart> {
        let Some(product) = DemoCatalog::global().find(product_id) else {
            debug!(product_id = %product_id, "Ignoring add for unknown demo product");
            return self.snapshot();
        };
        let info = ProductInfo::from(product);
        self.add_product(&info, quantity).await
    }

    /// Add an already-resolved product.
    pub async fn add_product(&mut self, product: &ProductInfo, quantity: i64) -> Arc<Cart> {
        let next = self.cart.with_product(product, quantity);
        self.commit(next).await
    }

    /// Remove a product's line.
    pub async fn remove(&mut self, product_id: ProductId) -> Arc<Cart> {
        let next = self.cart.without(product_id);
        self.commit(next).await
    }

    /// Overwrite a line's quantity; `quantity <= 0` removes it.
    pub async fn set_quantity(&mut self, product_id: ProductId, quantity: i64) -> Arc<Cart> {
        let next = self.cart.with_quantity(product_id, quantity);
        self.commit(next).await
    }

    /// Empty the cart.
    pub async fn clear(&mut self) -> Arc<Cart> {
        let next = self.cart.cleared();
        self.commit(next).await
    }

    #[must_use]
    pub fn total_price(&self) -> Decimal {
        self.cart.total_price()
    }

    #[must_use]
    pub fn total_item_count(&self) -> u64 {
        self.cart.total_item_count()
    }

    async fn commit(&mut self, next: Cart) -> Arc<Cart> {
        self.cart = Arc::new(next);
        if self.hydrated {
            self.persist().await;
        }
        self.snapshot()
    }

    async fn persist(&self) {
        let serialized = match serde_json::to_string(self.cart.as_ref()) {
            Ok(serialized) => serialized,
            Err(e) => {
                warn!(error = %e, "Failed to serialize cart");
                return;
            }
        };
        if let Err(e) = self.storage.save(&serialized).await {
            warn!(error = %e, "Failed to persist cart");
        }
    }
}
