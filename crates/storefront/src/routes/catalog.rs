//! Catalog route handlers.
//!
//! All upstream reads go through the read-through cache.

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use threadline_core::{
    DisplayPricing, Product, ProductFilter, ProductId, ProductSort, Variation, attribute_slug,
    default_selection, select_variation,
};
use tracing::instrument;

use crate::cart::DemoCatalog;
use crate::commerce::{Category, ProductPage};
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Default page size for product listings.
const DEFAULT_PER_PAGE: u32 = 20;

/// Largest page size the commerce API accepts.
const MAX_PER_PAGE: u32 = 100;

/// Query parameters for product listings.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub category: Option<String>,
    pub search: Option<String>,
    #[serde(default)]
    pub sort: ProductSort,
}

impl ListQuery {
    fn filter(&self) -> ProductFilter {
        ProductFilter {
            category: self.category.clone(),
            search: self.search.clone(),
            sort: self.sort,
        }
    }

    fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    fn per_page(&self) -> u32 {
        self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE)
    }
}

/// Resolved pricing plus the selection it was resolved for.
#[derive(Debug, Serialize)]
pub struct PricingResponse {
    pub product_id: ProductId,
    pub selection: BTreeMap<String, String>,
    #[serde(flatten)]
    pub pricing: DisplayPricing,
}

/// Product page, narrowed by `category` and `search` and ordered by `sort`.
///
/// Filters apply to the fetched page; the pagination totals stay upstream's.
#[instrument(skip(state))]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ProductPage>> {
    let mut page = state
        .catalog()
        .list_products(query.page(), query.per_page())
        .await?;
    let filter = query.filter();
    if !filter.is_noop() {
        page.products = filter.apply(page.products);
    }
    Ok(Json(page))
}

/// Product detail.
#[instrument(skip(state), fields(product_id = %id))]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    let product = fetch_product(&state, id).await?;
    Ok(Json(product))
}

/// Variations of a product. Empty for simple products.
#[instrument(skip(state), fields(product_id = %id))]
pub async fn list_variations(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Vec<Variation>>> {
    let variations = state.catalog().list_variations(id).await?;
    Ok(Json(variations))
}

/// Display pricing for an attribute selection.
///
/// Query keys are attribute names (slugged on the way in). With no
/// selection the product's default attributes are used; a partial or
/// unmatched selection falls back to the base product's pricing.
#[instrument(skip(state, params), fields(product_id = %id))]
pub async fn pricing(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Json<PricingResponse>> {
    let product = fetch_product(&state, id).await?;

    let mut selection: BTreeMap<String, String> = params
        .into_iter()
        .map(|(name, value)| (attribute_slug(&name), value))
        .filter(|(_, value)| !value.is_empty())
        .collect();
    if selection.is_empty() {
        selection = default_selection(&product);
    }

    let variations = if product.is_variable() {
        state.catalog().list_variations(id).await?
    } else {
        Vec::new()
    };
    let selected = select_variation(&product, &variations, &selection);

    Ok(Json(PricingResponse {
        product_id: id,
        pricing: DisplayPricing::resolve(&product, selected),
        selection,
    }))
}

/// All categories.
#[instrument(skip(state))]
pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    let categories = state.catalog().list_categories().await?;
    Ok(Json(categories))
}

/// The static demo catalog.
pub async fn demo_products() -> Json<&'static [Product]> {
    Json(DemoCatalog::global().products())
}

async fn fetch_product(state: &AppState, id: ProductId) -> Result<Product> {
    state.catalog().get_product(id).await.map_err(|e| {
        if e.is_not_found() {
            AppError::NotFound(format!("product {id}"))
        } else {
            e.into()
        }
    })
}
