//! Conversions from commerce API wire types to core domain types.

use std::str::FromStr;

use rust_decimal::Decimal;
use threadline_core::{
    CategoryId, DefaultAttribute, OrderId, Product, ProductAttribute, ProductId, ProductKind,
    ProductSource, StockStatus, UNCATEGORIZED, Variation, VariationAttribute, VariationId,
};

use super::types::{Category, OrderSummary, RawCategory, RawOrder, RawProduct, RawVariation};

/// Parse an upstream price string. Missing, empty or malformed values are
/// `None`.
pub fn parse_price(value: Option<&str>) -> Option<Decimal> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    Decimal::from_str(value).ok()
}

fn stock_status(value: Option<&str>) -> StockStatus {
    value.map_or(StockStatus::OutOfStock, StockStatus::from_wire)
}

pub(crate) fn convert_product(raw: RawProduct) -> Product {
    let images: Vec<String> = raw
        .images
        .into_iter()
        .map(|image| image.src)
        .filter(|src| !src.is_empty())
        .collect();
    let categories: Vec<String> = raw
        .categories
        .into_iter()
        .map(|category| category.name)
        .filter(|name| !name.is_empty())
        .collect();

    Product {
        id: ProductId::new(raw.id),
        name: raw.name,
        price: parse_price(raw.price.as_deref()).unwrap_or_default(),
        sale_price: parse_price(raw.sale_price.as_deref()),
        image: images.first().cloned().unwrap_or_default(),
        category: categories
            .first()
            .cloned()
            .unwrap_or_else(|| UNCATEGORIZED.to_string()),
        images,
        categories,
        description: raw.description.unwrap_or_default(),
        short_description: raw.short_description.unwrap_or_default(),
        stock_status: stock_status(raw.stock_status.as_deref()),
        kind: ProductKind::from_wire(raw.kind.as_deref()),
        attributes: raw
            .attributes
            .into_iter()
            .map(|attr| ProductAttribute {
                id: attr.id,
                name: attr.name,
                slug: attr.slug,
                options: attr.options,
                variation: attr.variation,
                visible: attr.visible,
            })
            .collect(),
        default_attributes: raw
            .default_attributes
            .into_iter()
            .map(|attr| DefaultAttribute {
                name: attr.name,
                option: attr.option,
            })
            .collect(),
        variation_ids: raw.variations.into_iter().map(VariationId::new).collect(),
        source: ProductSource::Remote,
    }
}

pub(crate) fn convert_variation(raw: RawVariation) -> Variation {
    let image = raw
        .image
        .map(|image| image.src)
        .or_else(|| raw.images.into_iter().next().map(|image| image.src))
        .filter(|src| !src.is_empty());

    Variation {
        id: VariationId::new(raw.id),
        price: parse_price(raw.price.as_deref()).unwrap_or_default(),
        sale_price: parse_price(raw.sale_price.as_deref()),
        stock_status: stock_status(raw.stock_status.as_deref()),
        attributes: raw
            .attributes
            .into_iter()
            .map(|attr| VariationAttribute {
                name: attr.name,
                option: attr.option,
            })
            .collect(),
        image,
    }
}

pub(crate) fn convert_category(raw: RawCategory) -> Category {
    Category {
        id: CategoryId::new(raw.id),
        name: raw.name,
        slug: raw.slug,
        parent: (raw.parent != 0).then(|| CategoryId::new(raw.parent)),
        description: raw.description,
        image: raw.image.map(|image| image.src).filter(|src| !src.is_empty()),
        count: raw.count,
    }
}

pub(crate) fn convert_order(raw: RawOrder) -> OrderSummary {
    let number = if raw.number.is_empty() {
        raw.id.to_string()
    } else {
        raw.number
    };
    OrderSummary {
        id: OrderId::new(raw.id),
        number,
        status: raw.status,
        total: raw.total,
    }
}
