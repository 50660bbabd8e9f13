//! Stateless payment-intent and order creation endpoints.
//!
//! These take the cart lines and customer in the request body instead of
//! reading the session.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use threadline_core::{CartLineItem, CustomerInfo, OrderId, PaymentMethod, ProductId};
use tracing::{error, info, instrument};

use crate::checkout::build_order_request;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::payments::PaymentIntentRequest;
use crate::state::AppState;

/// A cart line as posted by the browser.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderItem {
    pub id: ProductId,
    pub quantity: u32,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default)]
    pub name: String,
}

impl From<OrderItem> for CartLineItem {
    fn from(item: OrderItem) -> Self {
        Self {
            product_id: item.id,
            quantity: item.quantity,
            unit_price: item.price,
            name: item.name,
            image_url: String::new(),
            category: String::new(),
        }
    }
}

/// Body of `POST /api/create-payment-intent`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentIntentBody {
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub customer_info: Option<CustomerInfo>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentIntentResponse {
    pub client_secret: String,
    pub payment_intent_id: String,
}

/// Body of `POST /api/create-order`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderBody {
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub customer_info: Option<CustomerInfo>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub payment_method_title: Option<String>,
    #[serde(default)]
    pub is_paid: bool,
    #[serde(default)]
    pub stripe_payment_intent_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub success: bool,
    pub order_id: OrderId,
    pub order_number: String,
    pub order_status: String,
    pub order_total: String,
    pub message: &'static str,
}

fn bad_body(rejection: &JsonRejection) -> AppError {
    AppError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
}

/// Create a payment intent for the posted items.
///
/// Amount is `Σ(price × quantity)` in minor units of the store currency.
#[instrument(skip(state, body))]
pub async fn create_payment_intent(
    State(state): State<AppState>,
    body: std::result::Result<Json<CreatePaymentIntentBody>, JsonRejection>,
) -> Result<Json<CreatePaymentIntentResponse>> {
    let Json(body) = body.map_err(|e| bad_body(&e))?;
    if body.items.is_empty() {
        return Err(AppError::BadRequest("No items in cart".to_string()));
    }

    let items: Vec<CartLineItem> = body.items.into_iter().map(CartLineItem::from).collect();
    let customer = body.customer_info.unwrap_or_default();
    let request =
        PaymentIntentRequest::for_items(&items, &customer, state.config().currency, None);

    let intent = state.payments().create_intent(&request).await.map_err(|e| {
        error!(error = %e, "Failed to create payment intent");
        AppError::Upstream("Failed to create payment intent")
    })?;

    info!(payment_intent_id = %intent.id, amount = request.amount, "Payment intent created");
    Ok(Json(CreatePaymentIntentResponse {
        client_secret: intent.client_secret,
        payment_intent_id: intent.id,
    }))
}

/// Create an order upstream from the posted items and customer.
///
/// Payment method defaults to pay-on-delivery. A supplied method or title
/// string is passed through unchanged.
#[instrument(skip(state, body))]
pub async fn create_order(
    State(state): State<AppState>,
    body: std::result::Result<Json<CreateOrderBody>, JsonRejection>,
) -> Result<Json<CreateOrderResponse>> {
    let Json(body) = body.map_err(|e| bad_body(&e))?;
    if body.items.is_empty() {
        return Err(AppError::BadRequest("No items in order".to_string()));
    }
    let Some(customer) = body.customer_info else {
        return Err(AppError::BadRequest(
            "Customer information is required".to_string(),
        ));
    };

    let method = match body.payment_method.as_deref() {
        Some(m) if m == PaymentMethod::HostedCard.as_str() => PaymentMethod::HostedCard,
        _ => PaymentMethod::PayOnDelivery,
    };
    let items: Vec<CartLineItem> = body.items.into_iter().map(CartLineItem::from).collect();

    let mut request = build_order_request(
        &items,
        &customer,
        method,
        body.is_paid,
        body.stripe_payment_intent_id.as_deref(),
    );
    if let Some(raw) = body.payment_method.filter(|m| !m.is_empty()) {
        request.payment_method = raw;
    }
    if let Some(title) = body.payment_method_title.filter(|t| !t.is_empty()) {
        request.payment_method_title = title;
    }

    let order = state.orders().create_order(&request).await.map_err(|e| {
        error!(error = %e, "Failed to create order");
        AppError::Upstream("Failed to create order in WooCommerce")
    })?;

    add_breadcrumb(
        "order",
        "Order created",
        Some(&[("order_number", order.number.as_str())]),
    );
    info!(order_id = %order.id, order_number = %order.number, "Order created");

    Ok(Json(CreateOrderResponse {
        success: true,
        order_id: order.id,
        order_number: order.number,
        order_status: order.status,
        order_total: order.total,
        message: "Order created successfully",
    }))
}
