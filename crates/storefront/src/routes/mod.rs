//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                        - Liveness
//! GET  /health/ready                  - Readiness (database + cache)
//!
//! # Catalog
//! GET  /api/products                  - Product page (?page&per_page)
//! GET  /api/products/{id}             - Product detail
//! GET  /api/products/{id}/variations  - Variations of a variable product
//! GET  /api/products/{id}/pricing     - Display pricing for selected attributes
//! GET  /api/categories                - Categories
//! GET  /api/demo-products             - Static demo catalog
//!
//! # Cart (session)
//! GET  /api/cart                      - Cart lines and totals
//! GET  /api/cart/count                - Item count badge
//! POST /api/cart/add                  - Add a demo product by id
//! POST /api/cart/add-product          - Add a resolved product
//! POST /api/cart/update               - Set quantity (<= 0 removes)
//! POST /api/cart/remove               - Remove a line
//! POST /api/cart/clear                - Empty the cart
//!
//! # Toasts (session)
//! GET    /api/toasts                  - Active toasts
//! DELETE /api/toasts/{id}             - Dismiss
//!
//! # Checkout (session)
//! GET  /api/checkout                  - Current checkout state
//! POST /api/checkout/start            - Begin a new checkout
//! POST /api/checkout/shipping         - Submit customer details
//! POST /api/checkout/edit-shipping    - Back to shipping
//! POST /api/checkout/payment-method   - Choose card or pay-on-delivery
//! POST /api/checkout/payment          - Prepare the payment step
//! POST /api/checkout/confirm-card     - Card payment finished
//! POST /api/checkout/confirm-cod      - Place pay-on-delivery order
//!
//! # Stateless API
//! POST /api/create-payment-intent     - Create a card payment intent
//! POST /api/create-order              - Create an order upstream
//! POST /api/webhooks/wordpress        - Content change notification
//! ```

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod health;
pub mod orders;
pub mod toasts;
pub mod webhooks;

use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::state::AppState;

/// Health checks, served outside `/api`.
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
}

/// Catalog routes.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(catalog::list_products))
        .route("/products/{id}", get(catalog::get_product))
        .route("/products/{id}/variations", get(catalog::list_variations))
        .route("/products/{id}/pricing", get(catalog::pricing))
        .route("/categories", get(catalog::list_categories))
        .route("/demo-products", get(catalog::demo_products))
}

/// Cart routes.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/count", get(cart::count))
        .route("/add", post(cart::add))
        .route("/add-product", post(cart::add_product))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
}

/// Checkout routes.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::show))
        .route("/start", post(checkout::start))
        .route("/shipping", post(checkout::submit_shipping))
        .route("/edit-shipping", post(checkout::edit_shipping))
        .route("/payment-method", post(checkout::select_payment_method))
        .route("/payment", post(checkout::enter_payment))
        .route("/confirm-card", post(checkout::confirm_card))
        .route("/confirm-cod", post(checkout::confirm_cod))
}

/// JSON API routes whose bodies pass through sanitization.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(catalog_routes())
        .nest("/cart", cart_routes())
        .route("/toasts", get(toasts::list))
        .route("/toasts/{id}", delete(toasts::dismiss))
        .nest("/checkout", checkout_routes())
        .route("/create-payment-intent", post(orders::create_payment_intent))
        .route("/create-order", post(orders::create_order))
}

/// Webhook routes. Signatures cover the raw body, so these skip
/// sanitization.
pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/webhooks/wordpress", post(webhooks::wordpress))
}
