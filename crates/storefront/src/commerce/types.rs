//! Wire types for the commerce REST API.
//!
//! `Raw*` types mirror upstream JSON and are only used inside this module;
//! everything else in the crate sees the normalized core types.

use serde::{Deserialize, Serialize};
use threadline_core::{CategoryId, OrderId, Product};

// =============================================================================
// Upstream responses
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawImage {
    #[serde(default)]
    pub src: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawCategoryRef {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawAttribute {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub variation: bool,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawNamedOption {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub option: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawProduct {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub sale_price: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub images: Vec<RawImage>,
    #[serde(default)]
    pub categories: Vec<RawCategoryRef>,
    #[serde(default)]
    pub stock_status: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub attributes: Vec<RawAttribute>,
    #[serde(default)]
    pub default_attributes: Vec<RawNamedOption>,
    #[serde(default)]
    pub variations: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawVariation {
    pub id: i64,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub sale_price: Option<String>,
    #[serde(default)]
    pub stock_status: Option<String>,
    #[serde(default)]
    pub attributes: Vec<RawNamedOption>,
    #[serde(default)]
    pub image: Option<RawImage>,
    #[serde(default)]
    pub images: Vec<RawImage>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawCategory {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub parent: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: Option<RawImage>,
    #[serde(default)]
    pub count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawOrder {
    pub id: i64,
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub total: String,
}

/// Error body returned by the REST API.
#[derive(Debug, Deserialize)]
pub(crate) struct RawApiError {
    #[serde(default)]
    pub message: String,
}

// =============================================================================
// Normalized results
// =============================================================================

/// A page of products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPage {
    pub products: Vec<Product>,
    /// From the `X-WP-TotalPages` header, `1` when absent.
    pub total_pages: u32,
    /// From the `X-WP-Total` header.
    pub total: Option<u64>,
}

/// Product category metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub parent: Option<CategoryId>,
    pub description: String,
    pub image: Option<String>,
    pub count: u64,
}

/// Identity and totals of an order as recorded upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub id: OrderId,
    pub number: String,
    pub status: String,
    pub total: String,
}

// =============================================================================
// Order creation
// =============================================================================

/// Billing address block.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BillingAddress {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address_1: String,
    pub city: String,
    pub postcode: String,
    pub country: String,
}

/// Shipping address block.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub first_name: String,
    pub last_name: String,
    pub address_1: String,
    pub city: String,
    pub postcode: String,
    pub country: String,
}

/// One ordered product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub product_id: threadline_core::ProductId,
    pub quantity: u32,
}

/// Order metadata entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaData {
    pub key: String,
    pub value: String,
}

/// Body of `POST /orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub payment_method: String,
    pub payment_method_title: String,
    pub set_paid: bool,
    pub billing: BillingAddress,
    pub shipping: ShippingAddress,
    pub line_items: Vec<OrderLineItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_note: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meta_data: Vec<MetaData>,
}

impl CreateOrderRequest {
    /// Value of a metadata entry.
    #[must_use]
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.meta_data
            .iter()
            .find(|m| m.key == key)
            .map(|m| m.value.as_str())
    }
}
