//! Product listing filters.
//!
//! Narrow a product list by category and name, then order it. Applied to a
//! page of products after it has been fetched.

use serde::{Deserialize, Serialize};

use super::product::Product;

/// Category value that disables category filtering.
pub const ALL_CATEGORIES: &str = "All";

/// Listing order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProductSort {
    /// Effective price, cheapest first.
    PriceLow,
    /// Effective price, most expensive first.
    PriceHigh,
    /// Name, case-insensitive.
    Name,
    /// Order as fetched. Unknown values land here.
    #[default]
    #[serde(other)]
    Unsorted,
}

/// Category, name search and sort for a product listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub search: Option<String>,
    #[serde(default)]
    pub sort: ProductSort,
}

impl ProductFilter {
    fn category(&self) -> Option<&str> {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty() && *c != ALL_CATEGORIES)
    }

    fn search(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    /// Whether the filter leaves a listing untouched.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.category().is_none() && self.search().is_none() && self.sort == ProductSort::Unsorted
    }

    /// Keep the products in the category whose name contains the search
    /// term, then sort them. Ties keep their fetched order.
    #[must_use]
    pub fn apply(&self, products: Vec<Product>) -> Vec<Product> {
        let category = self.category();
        let search = self.search();

        let mut products: Vec<Product> = products
            .into_iter()
            .filter(|p| {
                category.is_none_or(|c| p.category == c || p.categories.iter().any(|n| n == c))
            })
            .filter(|p| {
                search
                    .as_deref()
                    .is_none_or(|term| p.name.to_lowercase().contains(term))
            })
            .collect();

        match self.sort {
            ProductSort::PriceLow => products.sort_by_key(Product::unit_price),
            ProductSort::PriceHigh => {
                products.sort_by(|a, b| b.unit_price().cmp(&a.unit_price()));
            }
            ProductSort::Name => products.sort_by_cached_key(|p| p.name.to_lowercase()),
            ProductSort::Unsorted => {}
        }
        products
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::ProductId;
    use crate::types::product::ProductKind;
    use crate::types::product::tests::sample_product;

    fn product(id: i64, name: &str, category: &str, price: i64, sale: Option<i64>) -> Product {
        let mut p = sample_product(ProductKind::Simple);
        p.id = ProductId::new(id);
        p.name = name.to_string();
        p.category = category.to_string();
        p.categories = vec![category.to_string()];
        p.price = Decimal::from(price);
        p.sale_price = sale.map(Decimal::from);
        p
    }

    fn catalog() -> Vec<Product> {
        vec![
            product(1, "Silk Dupatta", "Women", 2500, None),
            product(2, "linen kurta", "Men", 4000, Some(1800)),
            product(3, "Embroidered Kurta", "Women", 6000, None),
            product(4, "Cotton Shalwar", "Men", 2000, None),
        ]
    }

    fn ids(products: &[Product]) -> Vec<i64> {
        products.iter().map(|p| p.id.as_i64()).collect()
    }

    #[test]
    fn test_default_filter_keeps_order() {
        let filter = ProductFilter::default();
        assert!(filter.is_noop());
        assert_eq!(ids(&filter.apply(catalog())), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_category_filter() {
        let filter = ProductFilter {
            category: Some("Men".to_string()),
            ..ProductFilter::default()
        };
        assert_eq!(ids(&filter.apply(catalog())), vec![2, 4]);

        let all = ProductFilter {
            category: Some(ALL_CATEGORIES.to_string()),
            ..ProductFilter::default()
        };
        assert!(all.is_noop());
        assert_eq!(all.apply(catalog()).len(), 4);
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let filter = ProductFilter {
            search: Some("KURTA".to_string()),
            ..ProductFilter::default()
        };
        assert_eq!(ids(&filter.apply(catalog())), vec![2, 3]);

        let blank = ProductFilter {
            search: Some("  ".to_string()),
            ..ProductFilter::default()
        };
        assert_eq!(blank.apply(catalog()).len(), 4);
    }

    #[test]
    fn test_price_sorts_use_sale_price() {
        let low = ProductFilter {
            sort: ProductSort::PriceLow,
            ..ProductFilter::default()
        };
        assert_eq!(ids(&low.apply(catalog())), vec![2, 4, 1, 3]);

        let high = ProductFilter {
            sort: ProductSort::PriceHigh,
            ..ProductFilter::default()
        };
        assert_eq!(ids(&high.apply(catalog())), vec![3, 1, 4, 2]);
    }

    #[test]
    fn test_name_sort_ignores_case() {
        let filter = ProductFilter {
            sort: ProductSort::Name,
            ..ProductFilter::default()
        };
        assert_eq!(ids(&filter.apply(catalog())), vec![4, 3, 2, 1]);
    }

    #[test]
    fn test_filters_combine() {
        let filter = ProductFilter {
            category: Some("Women".to_string()),
            search: Some("a".to_string()),
            sort: ProductSort::PriceHigh,
        };
        assert_eq!(ids(&filter.apply(catalog())), vec![3, 1]);
    }

    #[test]
    fn test_sort_wire_names() {
        let sort: ProductSort = serde_json::from_str("\"price-low\"").unwrap();
        assert_eq!(sort, ProductSort::PriceLow);
        let sort: ProductSort = serde_json::from_str("\"price-high\"").unwrap();
        assert_eq!(sort, ProductSort::PriceHigh);
        let sort: ProductSort = serde_json::from_str("\"popularity\"").unwrap();
        assert_eq!(sort, ProductSort::Unsorted);
    }
}
