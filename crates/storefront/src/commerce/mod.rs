//! Commerce platform REST API client.
//!
//! # Architecture
//!
//! - The commerce platform is the source of truth for products and orders;
//!   nothing is synced locally
//! - Every response is normalized into core types at this boundary
//! - Every operation returns `Result`; callers decide how to degrade
//! - Read paths are cached by [`crate::cache::CachedCatalog`], not here
//!
//! # Example
//!
//! ```rust,ignore
//! use threadline_storefront::commerce::CommerceClient;
//!
//! let client = CommerceClient::new(&config.commerce);
//! let page = client.list_products(1, 12).await?;
//! let product = client.get_product(page.products[0].id).await?;
//! ```

mod conversions;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use thiserror::Error;
use threadline_core::{OrderId, OrderStatus, Product, ProductId, Variation};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::CommerceConfig;

pub use conversions::parse_price;
pub use types::{
    BillingAddress, Category, CreateOrderRequest, MetaData, OrderLineItem, OrderSummary,
    ProductPage, ShippingAddress,
};

use conversions::{convert_category, convert_order, convert_product, convert_variation};
use types::{RawApiError, RawCategory, RawOrder, RawProduct, RawVariation};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur when calling the commerce API.
#[derive(Debug, Error)]
pub enum CommerceError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Rate limited upstream.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Response body could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configured base URL is not a valid URL.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl CommerceError {
    /// Whether the upstream reported the resource as missing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
    }
}

/// Anything that can record an order with the commerce platform.
#[async_trait]
pub trait OrderBackend: Send + Sync {
    /// Create an order.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError` if the order could not be recorded.
    async fn create_order(&self, request: &CreateOrderRequest)
    -> Result<OrderSummary, CommerceError>;
}

// =============================================================================
// CommerceClient
// =============================================================================

/// Client for the commerce REST API (products, categories, orders).
#[derive(Clone)]
pub struct CommerceClient {
    inner: Arc<CommerceClientInner>,
}

struct CommerceClientInner {
    client: reqwest::Client,
    base_url: String,
    credentials: Option<(String, SecretString)>,
}

impl CommerceClient {
    /// Create a new client.
    ///
    /// When either half of the credential pair is missing the client still
    /// works, but sends requests unauthenticated; the upstream will
    /// generally reject them.
    #[must_use]
    pub fn new(config: &CommerceConfig) -> Self {
        let credentials = match (&config.consumer_key, &config.consumer_secret) {
            (Some(key), Some(secret)) => Some((key.clone(), secret.clone())),
            _ => {
                warn!("Commerce API credentials not configured, sending unauthenticated requests");
                None
            }
        };

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            inner: Arc::new(CommerceClientInner {
                client,
                base_url: config.api_url.trim_end_matches('/').to_string(),
                credentials,
            }),
        }
    }

    fn url(&self, path: &str, query: &[(&str, String)]) -> Result<Url, CommerceError> {
        let mut url = Url::parse(&format!("{}{path}", self.inner.base_url))?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }

    /// Execute a request and decode the JSON body.
    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&serde_json::Value>,
    ) -> Result<(T, HeaderMap), CommerceError> {
        let mut request = self.inner.client.request(method, url);
        if let Some((key, secret)) = &self.inner.credentials {
            request = request.basic_auth(key, Some(secret.expose_secret()));
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(CommerceError::RateLimited(retry_after));
        }

        let headers = response.headers().clone();
        let response_text = response.text().await?;

        if !status.is_success() {
            if status == StatusCode::NOT_FOUND {
                debug!(status = %status, "Commerce API resource not found");
            } else {
                tracing::error!(
                    status = %status,
                    body = %response_text.chars().take(500).collect::<String>(),
                    "Commerce API returned non-success status"
                );
            }
            let message = serde_json::from_str::<RawApiError>(&response_text)
                .ok()
                .map(|e| e.message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| response_text.chars().take(200).collect());
            return Err(CommerceError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let value = serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %response_text.chars().take(500).collect::<String>(),
                "Failed to parse commerce API response"
            );
            CommerceError::Parse(e.to_string())
        })?;

        Ok((value, headers))
    }

    // =========================================================================
    // Product Methods
    // =========================================================================

    /// List a page of products.
    ///
    /// `total_pages` comes from the `X-WP-TotalPages` header and defaults to
    /// `1` when the header is absent or malformed.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_products(&self, page: u32, per_page: u32) -> Result<ProductPage, CommerceError> {
        let url = self.url(
            "/products",
            &[("page", page.to_string()), ("per_page", per_page.to_string())],
        )?;
        let (raw, headers): (Vec<RawProduct>, _) = self.execute(Method::GET, url, None).await?;

        let total_pages = header_number(&headers, "x-wp-totalpages")
            .and_then(|n| u32::try_from(n).ok())
            .filter(|n| *n > 0)
            .unwrap_or(1);
        let total = header_number(&headers, "x-wp-total");

        Ok(ProductPage {
            products: raw.into_iter().map(convert_product).collect(),
            total_pages,
            total,
        })
    }

    /// Get a single product.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails. A missing product is an
    /// `Api` error for which [`CommerceError::is_not_found`] is true.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: ProductId) -> Result<Product, CommerceError> {
        let url = self.url(&format!("/products/{id}"), &[])?;
        let (raw, _): (RawProduct, _) = self.execute(Method::GET, url, None).await?;
        Ok(convert_product(raw))
    }

    /// List the concrete variations of a variable product.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn list_variations(&self, product_id: ProductId) -> Result<Vec<Variation>, CommerceError> {
        let url = self.url(
            &format!("/products/{product_id}/variations"),
            &[("per_page", "100".to_string())],
        )?;
        let (raw, _): (Vec<RawVariation>, _) = self.execute(Method::GET, url, None).await?;
        Ok(raw.into_iter().map(convert_variation).collect())
    }

    /// List product categories.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Vec<Category>, CommerceError> {
        let url = self.url("/products/categories", &[("per_page", "100".to_string())])?;
        let (raw, _): (Vec<RawCategory>, _) = self.execute(Method::GET, url, None).await?;
        Ok(raw.into_iter().map(convert_category).collect())
    }

    // =========================================================================
    // Order Methods
    // =========================================================================

    /// Create an order.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(
        skip(self, request),
        fields(payment_method = %request.payment_method, line_items = request.line_items.len())
    )]
    pub async fn create_order(&self, request: &CreateOrderRequest) -> Result<OrderSummary, CommerceError> {
        let url = self.url("/orders", &[])?;
        let body = serde_json::to_value(request).map_err(|e| CommerceError::Parse(e.to_string()))?;
        let (raw, _): (RawOrder, _) = self.execute(Method::POST, url, Some(&body)).await?;
        let summary = convert_order(raw);
        tracing::info!(order_id = %summary.id, status = %summary.status, "Order created");
        Ok(summary)
    }

    /// Look up an order.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn get_order(&self, id: OrderId) -> Result<OrderSummary, CommerceError> {
        let url = self.url(&format!("/orders/{id}"), &[])?;
        let (raw, _): (RawOrder, _) = self.execute(Method::GET, url, None).await?;
        Ok(convert_order(raw))
    }

    /// Change an order's status.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(order_id = %id, status = %status))]
    pub async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<OrderSummary, CommerceError> {
        let url = self.url(&format!("/orders/{id}"), &[])?;
        let body = serde_json::json!({ "status": status });
        let (raw, _): (RawOrder, _) = self.execute(Method::PUT, url, Some(&body)).await?;
        Ok(convert_order(raw))
    }
}

#[async_trait]
impl OrderBackend for CommerceClient {
    async fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<OrderSummary, CommerceError> {
        Self::create_order(self, request).await
    }
}

fn header_number(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
}
