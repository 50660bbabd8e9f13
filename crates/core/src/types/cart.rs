//! Cart snapshot types.
//!
//! A [`Cart`] is an immutable value: every mutation returns a new cart and
//! leaves the original untouched, so holders of an older snapshot never see
//! a torn update.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::product::Product;

/// A resolved product record that can be added to a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub sale_price: Option<Decimal>,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub category: String,
}

impl ProductInfo {
    /// Price snapshotted into the cart line.
    #[must_use]
    pub fn unit_price(&self) -> Decimal {
        self.sale_price.unwrap_or(self.price)
    }
}

impl From<&Product> for ProductInfo {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            price: product.price,
            sale_price: product.sale_price,
            image: product.image.clone(),
            category: product.category.clone(),
        }
    }
}

/// One entry in the cart, unique by product id.
///
/// Serialized with the short field names the browser storage layout uses
/// (`id`, `price`, `image`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineItem {
    #[serde(rename = "id")]
    pub product_id: ProductId,
    pub quantity: u32,
    /// Price at the time the product was added. Never re-fetched.
    #[serde(rename = "price")]
    pub unit_price: Decimal,
    pub name: String,
    #[serde(rename = "image", default)]
    pub image_url: String,
    #[serde(default)]
    pub category: String,
}

impl CartLineItem {
    /// `unit_price * quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Ordered collection of cart line items.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    items: Vec<CartLineItem>,
}

fn clamp_quantity(quantity: i64) -> u32 {
    u32::try_from(quantity).unwrap_or(u32::MAX)
}

impl Cart {
    /// Empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Build a cart from stored line items.
    ///
    /// Duplicate product ids are merged and zero-quantity lines dropped so
    /// the one-line-per-product invariant holds for any input.
    #[must_use]
    pub fn from_items(items: Vec<CartLineItem>) -> Self {
        let mut merged: Vec<CartLineItem> = Vec::with_capacity(items.len());
        for item in items.into_iter().filter(|item| item.quantity > 0) {
            if let Some(existing) = merged.iter_mut().find(|l| l.product_id == item.product_id) {
                existing.quantity = existing.quantity.saturating_add(item.quantity);
            } else {
                merged.push(item);
            }
        }
        Self { items: merged }
    }

    /// Line items in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartLineItem] {
        &self.items
    }

    /// Line item for a product, if present.
    #[must_use]
    pub fn get(&self, product_id: ProductId) -> Option<&CartLineItem> {
        self.items.iter().find(|item| item.product_id == product_id)
    }

    /// Add `quantity` of a product, merging with an existing line.
    ///
    /// Non-positive quantities leave the cart unchanged.
    #[must_use]
    pub fn with_product(&self, product: &ProductInfo, quantity: i64) -> Self {
        if quantity <= 0 {
            return self.clone();
        }
        let quantity = clamp_quantity(quantity);
        let mut items = self.items.clone();

        if let Some(existing) = items.iter_mut().find(|item| item.product_id == product.id) {
            existing.quantity = existing.quantity.saturating_add(quantity);
        } else {
            items.push(CartLineItem {
                product_id: product.id,
                quantity,
                unit_price: product.unit_price(),
                name: product.name.clone(),
                image_url: product.image.clone(),
                category: product.category.clone(),
            });
        }
        Self { items }
    }

    /// Remove a product's line. No-op if absent.
    #[must_use]
    pub fn without(&self, product_id: ProductId) -> Self {
        Self {
            items: self
                .items
                .iter()
                .filter(|item| item.product_id != product_id)
                .cloned()
                .collect(),
        }
    }

    /// Overwrite a line's quantity; `quantity <= 0` removes the line.
    #[must_use]
    pub fn with_quantity(&self, product_id: ProductId, quantity: i64) -> Self {
        if quantity <= 0 {
            return self.without(product_id);
        }
        let quantity = clamp_quantity(quantity);
        Self {
            items: self
                .items
                .iter()
                .map(|item| {
                    if item.product_id == product_id {
                        CartLineItem {
                            quantity,
                            ..item.clone()
                        }
                    } else {
                        item.clone()
                    }
                })
                .collect(),
        }
    }

    /// Empty cart.
    #[must_use]
    pub const fn cleared(&self) -> Self {
        Self::new()
    }

    /// Sum of `unit_price * quantity` over all lines.
    #[must_use]
    pub fn total_price(&self) -> Decimal {
        self.items.iter().map(CartLineItem::line_total).sum()
    }

    /// Sum of quantities (not line count).
    #[must_use]
    pub fn total_item_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn info(id: i64, price: i64, sale: Option<i64>) -> ProductInfo {
        ProductInfo {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            price: Decimal::from(price),
            sale_price: sale.map(Decimal::from),
            image: format!("/products/{id}.jpg"),
            category: "Women".to_string(),
        }
    }

    #[test]
    fn test_add_snapshots_sale_price() {
        let cart = Cart::new().with_product(&info(1, 2000, Some(1500)), 2);
        let line = cart.get(ProductId::new(1)).unwrap();
        assert_eq!(line.unit_price, Decimal::from(1500));
        assert_eq!(line.quantity, 2);
        assert_eq!(cart.total_price(), Decimal::from(3000));
    }

    #[test]
    fn test_add_existing_increments() {
        let product = info(1, 100, None);
        let cart = Cart::new().with_product(&product, 1).with_product(&product, 3);
        assert_eq!(cart.line_count(), 1);
        assert_eq!(cart.total_item_count(), 4);
    }

    #[test]
    fn test_add_non_positive_is_ignored() {
        let cart = Cart::new().with_product(&info(1, 100, None), 0);
        assert!(cart.is_empty());
        let cart = cart.with_product(&info(1, 100, None), -2);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_zero_or_negative_removes() {
        let cart = Cart::new()
            .with_product(&info(1, 100, None), 2)
            .with_product(&info(2, 50, None), 1);
        assert!(cart.with_quantity(ProductId::new(1), 0).get(ProductId::new(1)).is_none());
        assert!(cart.with_quantity(ProductId::new(1), -5).get(ProductId::new(1)).is_none());
        assert_eq!(cart.with_quantity(ProductId::new(1), -5).line_count(), 1);
    }

    #[test]
    fn test_set_quantity_overwrites() {
        let cart = Cart::new()
            .with_product(&info(1, 100, None), 2)
            .with_quantity(ProductId::new(1), 7);
        assert_eq!(cart.get(ProductId::new(1)).unwrap().quantity, 7);
    }

    #[test]
    fn test_snapshot_is_immutable() {
        let original = Cart::new().with_product(&info(1, 100, None), 1);
        let cleared = original.cleared();
        assert_eq!(original.line_count(), 1);
        assert!(cleared.is_empty());
    }

    #[test]
    fn test_empty_cart_totals_are_zero() {
        let cart = Cart::new();
        assert_eq!(cart.total_price(), Decimal::ZERO);
        assert_eq!(cart.total_item_count(), 0);
    }

    #[test]
    fn test_serialized_layout() {
        let cart = Cart::new().with_product(&info(3, 1200, None), 1);
        let json = serde_json::to_value(&cart).unwrap();
        let line = &json[0];
        assert_eq!(line["id"], 3);
        assert_eq!(line["quantity"], 1);
        assert_eq!(line["price"], "1200");
        assert_eq!(line["image"], "/products/3.jpg");
        assert_eq!(line["category"], "Women");
    }

    #[test]
    fn test_from_items_merges_duplicates() {
        let line = CartLineItem {
            product_id: ProductId::new(9),
            quantity: 2,
            unit_price: Decimal::from(10),
            name: "Scarf".to_string(),
            image_url: String::new(),
            category: String::new(),
        };
        let cart = Cart::from_items(vec![line.clone(), line]);
        assert_eq!(cart.line_count(), 1);
        assert_eq!(cart.total_item_count(), 4);
    }

    proptest! {
        #[test]
        fn prop_repeated_adds_merge_into_one_line(quantities in prop::collection::vec(1i64..50, 1..20)) {
            let product = info(42, 999, None);
            let cart = quantities
                .iter()
                .fold(Cart::new(), |cart, q| cart.with_product(&product, *q));
            prop_assert_eq!(cart.line_count(), 1);
            let expected: i64 = quantities.iter().sum();
            prop_assert_eq!(i64::from(cart.get(ProductId::new(42)).unwrap().quantity), expected);
        }

        #[test]
        fn prop_totals_match_lines(entries in prop::collection::vec((1i64..10, 1i64..20, 1i64..5000), 0..15)) {
            let cart = entries
                .iter()
                .fold(Cart::new(), |cart, (id, qty, price)| cart.with_product(&info(*id, *price, None), *qty));
            let count: u64 = cart.items().iter().map(|l| u64::from(l.quantity)).sum();
            let total: Decimal = cart.items().iter().map(|l| l.unit_price * Decimal::from(l.quantity)).sum();
            prop_assert_eq!(cart.total_item_count(), count);
            prop_assert_eq!(cart.total_price(), total);
        }

        #[test]
        fn prop_persisted_round_trip(entries in prop::collection::vec((1i64..10, 1i64..20, 1i64..5000), 1..10)) {
            let cart = entries
                .iter()
                .fold(Cart::new(), |cart, (id, qty, price)| cart.with_product(&info(*id, *price, None), *qty));
            let json = serde_json::to_string(&cart).unwrap();
            let restored: Cart = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(restored, cart);
        }
    }
}
