//! Core types for Threadline.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod checkout;
pub mod filter;
pub mod id;
pub mod price;
pub mod product;
pub mod status;

pub use cart::{Cart, CartLineItem, ProductInfo};
pub use checkout::{CustomerInfo, PaymentMethod};
pub use filter::{ALL_CATEGORIES, ProductFilter, ProductSort};
pub use id::*;
pub use price::{CurrencyCode, Price, discount_percentage, format_price, has_discount};
pub use product::{
    DefaultAttribute, DisplayPricing, Product, ProductAttribute, ProductKind, ProductSource,
    UNCATEGORIZED, Variation, VariationAttribute, attribute_slug, default_selection,
    select_variation,
};
pub use status::{OrderStatus, StockStatus};
