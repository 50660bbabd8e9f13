//! Built-in demo catalog.
//!
//! Used by `POST /api/cart/add` (add by id) and `GET /api/demo-products`
//! so the storefront is browsable without a commerce backend.

use std::sync::LazyLock;

use rust_decimal::Decimal;
use threadline_core::{Product, ProductId, ProductKind, ProductSource, StockStatus};

static CATALOG: LazyLock<DemoCatalog> = LazyLock::new(DemoCatalog::build);

/// Static list of demo products.
#[derive(Debug)]
pub struct DemoCatalog {
    products: Vec<Product>,
}

#[allow(clippy::too_many_arguments)]
fn demo_product(
    id: i64,
    name: &str,
    price: i64,
    sale_price: Option<i64>,
    category: &str,
    image: &str,
    description: &str,
    stock_status: StockStatus,
) -> Product {
    Product {
        id: ProductId::new(id),
        name: name.to_string(),
        price: Decimal::from(price),
        sale_price: sale_price.map(Decimal::from),
        image: image.to_string(),
        images: vec![image.to_string()],
        category: category.to_string(),
        categories: vec![category.to_string()],
        description: description.to_string(),
        short_description: String::new(),
        stock_status,
        kind: ProductKind::Simple,
        attributes: Vec::new(),
        default_attributes: Vec::new(),
        variation_ids: Vec::new(),
        source: ProductSource::Demo,
    }
}

impl DemoCatalog {
    /// The process-wide catalog.
    #[must_use]
    pub fn global() -> &'static Self {
        &CATALOG
    }

    #[allow(clippy::too_many_lines)]
    fn build() -> Self {
        let products = vec![
            demo_product(
                1,
                "Classic Denim Jeans",
                3500,
                Some(2800),
                "Men",
                "/products/jeans.jpg",
                "Straight-leg jeans in heavyweight denim.",
                StockStatus::InStock,
            ),
            demo_product(
                2,
                "Two-Piece Business Suit",
                18_000,
                None,
                "Men",
                "/products/suit.jpg",
                "Tailored wool-blend suit for formal occasions.",
                StockStatus::InStock,
            ),
            demo_product(
                3,
                "Embroidered Kamiz Shalwar",
                6500,
                Some(5200),
                "Traditional",
                "/products/kamiz.jpg",
                "Cotton kamiz shalwar with hand embroidery at the neckline.",
                StockStatus::InStock,
            ),
            demo_product(
                4,
                "Lawn Printed Kurti",
                2400,
                None,
                "Women",
                "/products/kurti.jpg",
                "Lightweight lawn kurti for summer.",
                StockStatus::InStock,
            ),
            demo_product(
                5,
                "Chiffon Dupatta",
                1200,
                Some(950),
                "Women",
                "/products/dupatta.jpg",
                "Sheer chiffon dupatta with scalloped edges.",
                StockStatus::OnBackorder,
            ),
            demo_product(
                6,
                "Kids Cotton T-Shirt",
                900,
                None,
                "Kids",
                "/products/kids-tee.jpg",
                "Soft combed-cotton tee.",
                StockStatus::InStock,
            ),
            demo_product(
                7,
                "Leather Peshawari Chappal",
                4200,
                None,
                "Footwear",
                "/products/chappal.jpg",
                "Handmade leather sandals.",
                StockStatus::OutOfStock,
            ),
            demo_product(
                8,
                "Wool Waistcoat",
                5500,
                Some(4950),
                "Traditional",
                "/products/waistcoat.jpg",
                "Fitted waistcoat to layer over kurta or kamiz.",
                StockStatus::InStock,
            ),
        ];
        Self { products }
    }

    /// All demo products.
    #[must_use]
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    /// Look up a demo product by id.
    #[must_use]
    pub fn find(&self, id: ProductId) -> Option<&Product> {
        self.products.iter().find(|product| product.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_ids_are_unique() {
        let catalog = DemoCatalog::global();
        let mut ids: Vec<_> = catalog.products().iter().map(|p| p.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), catalog.products().len());
    }

    #[test]
    fn test_demo_products_are_tagged_demo() {
        assert!(
            DemoCatalog::global()
                .products()
                .iter()
                .all(|p| p.source == ProductSource::Demo)
        );
    }

    #[test]
    fn test_find() {
        let catalog = DemoCatalog::global();
        assert_eq!(
            catalog.find(ProductId::new(3)).map(|p| p.name.as_str()),
            Some("Embroidered Kamiz Shalwar")
        );
        assert!(catalog.find(ProductId::new(999)).is_none());
    }
}
