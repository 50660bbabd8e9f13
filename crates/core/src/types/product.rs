//! Normalized product and variation model.
//!
//! Products reach the storefront from two places: the built-in demo catalog
//! and the remote commerce API. Both are normalized into a single
//! [`Product`] at the data-access boundary, tagged with [`ProductSource`].

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{ProductId, VariationId};
use super::price::{discount_percentage, has_discount};
use super::status::StockStatus;

/// Category name used when a product has none assigned.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Where a product record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductSource {
    Demo,
    #[default]
    Remote,
}

/// Product type as reported by the commerce platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProductKind {
    #[default]
    Simple,
    Variable,
    Grouped,
    External,
}

impl ProductKind {
    /// Parse the upstream `type` field; anything unrecognized is `Simple`.
    #[must_use]
    pub fn from_wire(value: Option<&str>) -> Self {
        match value {
            Some("variable") => Self::Variable,
            Some("grouped") => Self::Grouped,
            Some("external") => Self::External,
            _ => Self::Simple,
        }
    }
}

/// An option axis of a variable product (e.g. size, color).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductAttribute {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub options: Vec<String>,
    /// Whether this axis is used to pick a variation.
    pub variation: bool,
    pub visible: bool,
}

/// Pre-selected option for an attribute axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultAttribute {
    pub name: String,
    pub option: String,
}

/// A chosen option on a concrete variation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariationAttribute {
    pub name: String,
    pub option: String,
}

/// A concrete, separately priced and stocked combination of attribute
/// options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variation {
    pub id: VariationId,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub stock_status: StockStatus,
    pub attributes: Vec<VariationAttribute>,
    pub image: Option<String>,
}

impl Variation {
    fn matches(&self, slug: &str, option: &str) -> bool {
        self.attributes
            .iter()
            .any(|attr| attribute_slug(&attr.name) == slug && attr.option == option)
    }
}

/// Normalized product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    /// First image, or empty when the product has none.
    pub image: String,
    pub images: Vec<String>,
    /// First category name, or [`UNCATEGORIZED`].
    pub category: String,
    pub categories: Vec<String>,
    pub description: String,
    pub short_description: String,
    pub stock_status: StockStatus,
    pub kind: ProductKind,
    pub attributes: Vec<ProductAttribute>,
    pub default_attributes: Vec<DefaultAttribute>,
    pub variation_ids: Vec<VariationId>,
    pub source: ProductSource,
}

impl Product {
    /// The price a cart line snapshots: the sale price when present.
    #[must_use]
    pub fn unit_price(&self) -> Decimal {
        self.sale_price.unwrap_or(self.price)
    }

    /// Whether the product is sold as attribute combinations.
    #[must_use]
    pub fn is_variable(&self) -> bool {
        self.kind == ProductKind::Variable
    }

    /// Slugs of the attribute axes that select a variation.
    pub fn variation_axes(&self) -> impl Iterator<Item = String> + '_ {
        self.attributes
            .iter()
            .filter(|attr| attr.variation)
            .map(|attr| attribute_slug(&attr.name))
    }
}

/// Slug for an attribute name: lowercased, whitespace runs replaced by `-`.
#[must_use]
pub fn attribute_slug(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// Selection map built from a product's default attributes, keyed by slug.
#[must_use]
pub fn default_selection(product: &Product) -> BTreeMap<String, String> {
    product
        .default_attributes
        .iter()
        .map(|attr| (attribute_slug(&attr.name), attr.option.clone()))
        .collect()
}

/// Resolve the variation matching a customer's attribute selection.
///
/// Returns `None` for partial selections (any variation axis of the product
/// without a chosen value) and when no variation matches every chosen value.
#[must_use]
pub fn select_variation<'a>(
    product: &Product,
    variations: &'a [Variation],
    selection: &BTreeMap<String, String>,
) -> Option<&'a Variation> {
    let complete = product
        .variation_axes()
        .all(|axis| selection.get(&axis).is_some_and(|value| !value.is_empty()));
    if !complete || selection.is_empty() {
        return None;
    }

    variations.iter().find(|variation| {
        selection
            .iter()
            .all(|(slug, option)| variation.matches(slug, option))
    })
}

/// Price and stock information to display for a product, taking the
/// selected variation into account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayPricing {
    pub variation_id: Option<VariationId>,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub stock_status: StockStatus,
    pub has_discount: bool,
    pub discount_percent: i64,
}

impl DisplayPricing {
    /// Build display pricing, falling back to the base product when no
    /// variation resolved.
    #[must_use]
    pub fn resolve(product: &Product, selected: Option<&Variation>) -> Self {
        let (variation_id, price, sale_price, stock_status) = selected.map_or(
            (None, product.price, product.sale_price, product.stock_status),
            |v| (Some(v.id), v.price, v.sale_price, v.stock_status),
        );
        let discounted = has_discount(price, sale_price);
        let discount_percent = match sale_price {
            Some(sale) if discounted => discount_percentage(price, sale),
            _ => 0,
        };

        Self {
            variation_id,
            price,
            sale_price,
            stock_status,
            has_discount: discounted,
            discount_percent,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_product(kind: ProductKind) -> Product {
        Product {
            id: ProductId::new(10),
            name: "Linen Kurta".to_string(),
            price: Decimal::from(4000),
            sale_price: Some(Decimal::from(3000)),
            image: "kurta.jpg".to_string(),
            images: vec!["kurta.jpg".to_string()],
            category: "Men".to_string(),
            categories: vec!["Men".to_string()],
            description: String::new(),
            short_description: String::new(),
            stock_status: StockStatus::InStock,
            kind,
            attributes: vec![
                ProductAttribute {
                    id: 1,
                    name: "Size".to_string(),
                    slug: "pa_size".to_string(),
                    options: vec!["M".to_string(), "L".to_string()],
                    variation: true,
                    visible: true,
                },
                ProductAttribute {
                    id: 2,
                    name: "Fabric Color".to_string(),
                    slug: "pa_color".to_string(),
                    options: vec!["White".to_string(), "Black".to_string()],
                    variation: true,
                    visible: true,
                },
            ],
            default_attributes: vec![
                DefaultAttribute {
                    name: "Size".to_string(),
                    option: "M".to_string(),
                },
                DefaultAttribute {
                    name: "Fabric Color".to_string(),
                    option: "White".to_string(),
                },
            ],
            variation_ids: vec![VariationId::new(101), VariationId::new(102)],
            source: ProductSource::Remote,
        }
    }

    fn variation(id: i64, size: &str, color: &str, price: i64) -> Variation {
        Variation {
            id: VariationId::new(id),
            price: Decimal::from(price),
            sale_price: None,
            stock_status: StockStatus::InStock,
            attributes: vec![
                VariationAttribute {
                    name: "Size".to_string(),
                    option: size.to_string(),
                },
                VariationAttribute {
                    name: "Fabric Color".to_string(),
                    option: color.to_string(),
                },
            ],
            image: None,
        }
    }

    fn selection(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_attribute_slug() {
        assert_eq!(attribute_slug("Fabric  Color"), "fabric-color");
        assert_eq!(attribute_slug("Size"), "size");
    }

    #[test]
    fn test_unit_price_prefers_sale_price() {
        let mut product = sample_product(ProductKind::Simple);
        assert_eq!(product.unit_price(), Decimal::from(3000));
        product.sale_price = None;
        assert_eq!(product.unit_price(), Decimal::from(4000));
    }

    #[test]
    fn test_select_variation_complete_selection() {
        let product = sample_product(ProductKind::Variable);
        let variations = vec![variation(101, "M", "White", 3500), variation(102, "L", "Black", 3800)];

        let chosen = selection(&[("size", "L"), ("fabric-color", "Black")]);
        let found = select_variation(&product, &variations, &chosen);
        assert_eq!(found.map(|v| v.id), Some(VariationId::new(102)));
    }

    #[test]
    fn test_select_variation_partial_selection_does_not_resolve() {
        let product = sample_product(ProductKind::Variable);
        let variations = vec![variation(101, "M", "White", 3500)];

        let chosen = selection(&[("size", "M")]);
        assert!(select_variation(&product, &variations, &chosen).is_none());
    }

    #[test]
    fn test_select_variation_no_match() {
        let product = sample_product(ProductKind::Variable);
        let variations = vec![variation(101, "M", "White", 3500)];

        let chosen = selection(&[("size", "L"), ("fabric-color", "White")]);
        assert!(select_variation(&product, &variations, &chosen).is_none());
    }

    #[test]
    fn test_default_selection_resolves_default_variation() {
        let product = sample_product(ProductKind::Variable);
        let variations = vec![variation(101, "M", "White", 3500), variation(102, "L", "Black", 3800)];

        let defaults = default_selection(&product);
        assert_eq!(defaults.get("fabric-color").map(String::as_str), Some("White"));
        let found = select_variation(&product, &variations, &defaults);
        assert_eq!(found.map(|v| v.id), Some(VariationId::new(101)));
    }

    #[test]
    fn test_display_pricing_falls_back_to_product() {
        let product = sample_product(ProductKind::Variable);
        let pricing = DisplayPricing::resolve(&product, None);
        assert_eq!(pricing.variation_id, None);
        assert_eq!(pricing.price, Decimal::from(4000));
        assert!(pricing.has_discount);
        assert_eq!(pricing.discount_percent, 25);
    }

    #[test]
    fn test_display_pricing_uses_variation() {
        let product = sample_product(ProductKind::Variable);
        let v = variation(102, "L", "Black", 3800);
        let pricing = DisplayPricing::resolve(&product, Some(&v));
        assert_eq!(pricing.variation_id, Some(VariationId::new(102)));
        assert_eq!(pricing.price, Decimal::from(3800));
        assert!(!pricing.has_discount);
        assert_eq!(pricing.discount_percent, 0);
    }
}
