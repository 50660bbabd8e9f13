//! Cached facade over the commerce client's read operations.

use threadline_core::{Product, ProductId, Variation};
use tracing::instrument;

use super::ReadThroughCache;
use crate::commerce::{Category, CommerceClient, CommerceError, ProductPage};

/// Catalog reads routed through the read-through cache.
///
/// Keys: `products:{page}:{per_page}`, `categories`, `product:{id}`,
/// `variations:{id}` (all under the storefront prefix).
#[derive(Clone)]
pub struct CachedCatalog {
    client: CommerceClient,
    cache: ReadThroughCache,
}

impl CachedCatalog {
    #[must_use]
    pub const fn new(client: CommerceClient, cache: ReadThroughCache) -> Self {
        Self { client, cache }
    }

    /// The uncached client.
    #[must_use]
    pub const fn client(&self) -> &CommerceClient {
        &self.client
    }

    #[must_use]
    pub const fn cache(&self) -> &ReadThroughCache {
        &self.cache
    }

    /// # Errors
    ///
    /// Returns an error if the page is not cached and the upstream call fails.
    #[instrument(skip(self))]
    pub async fn list_products(&self, page: u32, per_page: u32) -> Result<ProductPage, CommerceError> {
        let key = format!("products:{page}:{per_page}");
        self.cache
            .get_or_set(&key, || self.client.list_products(page, per_page), None)
            .await
    }

    /// # Errors
    ///
    /// Returns an error if categories are not cached and the upstream call
    /// fails.
    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Vec<Category>, CommerceError> {
        self.cache
            .get_or_set("categories", || self.client.list_categories(), None)
            .await
    }

    /// # Errors
    ///
    /// Returns an error if the product is not cached and the upstream call
    /// fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: ProductId) -> Result<Product, CommerceError> {
        let key = format!("product:{id}");
        self.cache
            .get_or_set(&key, || self.client.get_product(id), None)
            .await
    }

    /// # Errors
    ///
    /// Returns an error if the variations are not cached and the upstream
    /// call fails.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn list_variations(&self, product_id: ProductId) -> Result<Vec<Variation>, CommerceError> {
        let key = format!("variations:{product_id}");
        self.cache
            .get_or_set(&key, || self.client.list_variations(product_id), None)
            .await
    }

    /// Drop every cached listing page plus the product and variation
    /// entries of one product.
    pub async fn invalidate_product(&self, id: ProductId) {
        self.cache.invalidate("products:").await;
        self.cache.remove(&format!("product:{id}")).await;
        self.cache.remove(&format!("variations:{id}")).await;
    }
}
