//! Cart route handlers.
//!
//! The cart lives in the visitor's session. Every handler opens a
//! [`CartStore`] over the session, applies one change and returns the new
//! snapshot.

use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use threadline_core::{Cart, CartLineItem, ProductId, ProductInfo};
use tower_sessions::Session;
use tracing::instrument;

use crate::cart::{CartStore, DemoCatalog, SessionCartStorage};
use crate::error::add_breadcrumb;
use crate::toast::{ToastKind, ToastStore};

/// How long the "added to cart" toast stays up.
const ADDED_TOAST_MS: u64 = 3000;

/// Cart display data.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartLineItem>,
    pub total_price: Decimal,
    pub total_item_count: u64,
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            items: cart.items().to_vec(),
            total_price: cart.total_price(),
            total_item_count: cart.total_item_count(),
        }
    }
}

/// Cart badge count.
#[derive(Debug, Serialize)]
pub struct CartCount {
    pub count: u64,
}

fn default_quantity() -> i64 {
    1
}

/// Body of `POST /api/cart/add`.
#[derive(Debug, Deserialize)]
pub struct AddByIdRequest {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

/// Body of `POST /api/cart/add-product`.
#[derive(Debug, Deserialize)]
pub struct AddProductRequest {
    pub product: ProductInfo,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

/// Body of `POST /api/cart/update`.
#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Body of `POST /api/cart/remove`.
#[derive(Debug, Deserialize)]
pub struct RemoveRequest {
    pub product_id: ProductId,
}

// =============================================================================
// Session Helpers
// =============================================================================

/// Open the visitor's cart.
pub(crate) async fn open_cart(session: &Session) -> CartStore<SessionCartStorage> {
    CartStore::open(SessionCartStorage::new(session.clone())).await
}

async fn toast_added(session: &Session, name: &str) {
    let mut toasts = ToastStore::load(session).await;
    toasts.add(
        format!("{name} added to cart"),
        ToastKind::Success,
        Some(ADDED_TOAST_MS),
    );
    toasts.save(session).await;
}

// =============================================================================
// Handlers
// =============================================================================

/// Show the cart.
#[instrument(skip(session))]
pub async fn show(session: Session) -> Json<CartView> {
    let cart = open_cart(&session).await;
    Json(CartView::from(cart.snapshot().as_ref()))
}

/// Cart item count.
#[instrument(skip(session))]
pub async fn count(session: Session) -> Json<CartCount> {
    let cart = open_cart(&session).await;
    Json(CartCount {
        count: cart.total_item_count(),
    })
}

/// Add a demo catalog product by id.
///
/// An unknown id or a non-positive quantity leaves the cart unchanged and
/// raises no toast.
#[instrument(skip(session), fields(product_id = %body.product_id))]
pub async fn add(session: Session, Json(body): Json<AddByIdRequest>) -> Json<CartView> {
    let mut cart = open_cart(&session).await;
    let snapshot = cart.add_by_id(body.product_id, body.quantity).await;

    if let Some(product) = DemoCatalog::global().find(body.product_id)
        && body.quantity > 0
    {
        add_breadcrumb(
            "cart",
            "Added product",
            Some(&[("product_id", body.product_id.to_string().as_str())]),
        );
        toast_added(&session, &product.name).await;
    }

    Json(CartView::from(snapshot.as_ref()))
}

/// Add a product the client already resolved.
#[instrument(skip(session, body), fields(product_id = %body.product.id))]
pub async fn add_product(session: Session, Json(body): Json<AddProductRequest>) -> Json<CartView> {
    let mut cart = open_cart(&session).await;
    let snapshot = cart.add_product(&body.product, body.quantity).await;

    if body.quantity > 0 {
        add_breadcrumb(
            "cart",
            "Added product",
            Some(&[("product_id", body.product.id.to_string().as_str())]),
        );
        toast_added(&session, &body.product.name).await;
    }

    Json(CartView::from(snapshot.as_ref()))
}

/// Set a line's quantity. Zero or less removes the line.
#[instrument(skip(session), fields(product_id = %body.product_id))]
pub async fn update(session: Session, Json(body): Json<UpdateRequest>) -> Json<CartView> {
    let mut cart = open_cart(&session).await;
    let snapshot = cart.set_quantity(body.product_id, body.quantity).await;
    Json(CartView::from(snapshot.as_ref()))
}

/// Remove a line.
#[instrument(skip(session), fields(product_id = %body.product_id))]
pub async fn remove(session: Session, Json(body): Json<RemoveRequest>) -> Json<CartView> {
    let mut cart = open_cart(&session).await;
    let snapshot = cart.remove(body.product_id).await;
    add_breadcrumb(
        "cart",
        "Removed product",
        Some(&[("product_id", body.product_id.to_string().as_str())]),
    );
    Json(CartView::from(snapshot.as_ref()))
}

/// Empty the cart.
#[instrument(skip(session))]
pub async fn clear(session: Session) -> Json<CartView> {
    let mut cart = open_cart(&session).await;
    let snapshot = cart.clear().await;
    Json(CartView::from(snapshot.as_ref()))
}
