//! Session checkout flow: shipping, card payment, pay-on-delivery and
//! reconciliation of paid orders the commerce API did not record.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::{Value, json};
use threadline_integration_tests::{TestStorefront, customer};
use threadline_storefront::reconcile::Reconciler;

/// Cart with one demo product (unit price 2800) and a checkout on the
/// payment step.
async fn at_payment_step() -> TestStorefront {
    let app = TestStorefront::start().await;
    app.post_json("/api/cart/add", &json!({"product_id": 1})).await;

    let (status, checkout) = app.post_json("/api/checkout/start", &json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(checkout["step"], "shipping");

    let (status, checkout) = app.post_json("/api/checkout/shipping", &customer()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(checkout["step"], "payment");
    app
}

async fn enter_card_payment(app: &TestStorefront) -> Value {
    let (status, checkout) = app.post_json("/api/checkout/payment", &json!({})).await;
    assert_eq!(status, StatusCode::OK);
    checkout
}

#[tokio::test]
async fn test_shipping_requires_fields() {
    let app = TestStorefront::start().await;
    app.post_json("/api/checkout/start", &json!({})).await;

    let (status, body) = app
        .post_json("/api/checkout/shipping", &json!({"firstName": "Ayesha"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("email"));

    let (_, checkout) = app.get_json("/api/checkout").await;
    assert_eq!(checkout["step"], "shipping");
    assert_eq!(checkout["customer"]["firstName"], "Ayesha");
}

#[tokio::test]
async fn test_edit_shipping_returns_to_first_step() {
    let app = at_payment_step().await;

    let (status, checkout) = app.post_json("/api/checkout/edit-shipping", &json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(checkout["step"], "shipping");
    assert_eq!(checkout["customer"]["city"], "Lahore");

    let (status, _) = app.post_json("/api/checkout/edit-shipping", &json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_payment_intent_created_once_with_pending_record() {
    let app = at_payment_step().await;

    let checkout = enter_card_payment(&app).await;
    assert_eq!(checkout["paymentIntent"]["id"], "pi_test_1");
    assert_eq!(checkout["paymentIntent"]["client_secret"], "pi_test_1_secret_abc");
    let reference = checkout["pendingReference"].as_str().unwrap().to_string();

    // A second visit to the payment step reuses the intent.
    enter_card_payment(&app).await;

    {
        let payments = app.payments.state();
        assert_eq!(payments.created.len(), 1);
        assert_eq!(payments.created[0]["amount"], "280000");
        assert_eq!(payments.created[0]["currency"], "pkr");
        assert_eq!(
            payments.created[0]["metadata[pending_order_reference]"],
            reference
        );
        assert_eq!(
            payments.idempotency_keys[0].as_deref(),
            Some(format!("intent-{reference}").as_str())
        );
    }

    let unpaid = app.state.pending_orders().list(false, 10).await.unwrap();
    assert_eq!(unpaid.len(), 1);
    assert!(!unpaid[0].paid);
    assert_eq!(unpaid[0].payment_intent_id.as_deref(), Some("pi_test_1"));
}

#[tokio::test]
async fn test_card_payment_creates_order_and_clears_cart() {
    let app = at_payment_step().await;
    enter_card_payment(&app).await;

    let (status, checkout) = app
        .post_json(
            "/api/checkout/confirm-card",
            &json!({"payment_intent_id": "pi_test_1"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(checkout["step"], "success");
    assert_eq!(checkout["order"]["number"], "1001");
    assert!(checkout["orderWarning"].is_null());

    let (_, cart) = app.get_json("/api/cart").await;
    assert!(cart["items"].as_array().unwrap().is_empty());

    let sent = app.commerce.state().order_requests[0].clone();
    assert_eq!(sent["payment_method"], "stripe");
    assert_eq!(sent["set_paid"], true);
    assert_eq!(sent["billing"]["country"], "PK");
    assert_eq!(sent["line_items"][0]["product_id"], 1);
    assert_eq!(sent["meta_data"][0]["key"], "_stripe_payment_intent_id");
    assert_eq!(sent["meta_data"][0]["value"], "pi_test_1");

    assert!(app.state.pending_orders().list(false, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_declined_card_stays_on_payment() {
    let app = at_payment_step().await;
    enter_card_payment(&app).await;
    app.payments
        .set_status("pi_test_1", "requires_payment_method");

    let (status, checkout) = app
        .post_json(
            "/api/checkout/confirm-card",
            &json!({"payment_intent_id": "pi_test_1"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(checkout["step"], "payment");
    assert!(checkout["error"].is_string());
    assert!(app.commerce.state().order_requests.is_empty());

    let (_, count) = app.get_json("/api/cart/count").await;
    assert_eq!(count["count"], 1);
}

#[tokio::test]
async fn test_foreign_intent_is_rejected() {
    let app = at_payment_step().await;
    enter_card_payment(&app).await;

    let (status, _) = app
        .post_json(
            "/api/checkout/confirm-card",
            &json!({"payment_intent_id": "pi_someone_else"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_paid_order_failure_is_reconciled_later() {
    let app = at_payment_step().await;
    enter_card_payment(&app).await;
    app.commerce.fail_orders(3);

    let (status, checkout) = app
        .post_json(
            "/api/checkout/confirm-card",
            &json!({"payment_intent_id": "pi_test_1"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(checkout["step"], "success");
    assert!(checkout["order"].is_null());
    assert_eq!(
        checkout["orderWarning"],
        "Failed to save order. Please contact support."
    );
    assert_eq!(checkout["fallbackReference"].as_str().unwrap().len(), 9);
    assert_eq!(app.commerce.state().order_requests.len(), 3);

    let paid = app.state.pending_orders().list(true, 10).await.unwrap();
    assert_eq!(paid.len(), 1);
    assert!(paid[0].attempts >= 1);

    let summary = Reconciler::new(
        Arc::clone(app.state.orders()),
        Arc::clone(app.state.pending_orders()),
    )
    .run_once()
    .await
    .unwrap();
    assert_eq!(summary.created, 1);
    assert!(app.state.pending_orders().list(true, 10).await.unwrap().is_empty());

    let retried = app.commerce.state().order_requests.last().cloned().unwrap();
    assert_eq!(retried["meta_data"][0]["value"], "pi_test_1");
}

#[tokio::test]
async fn test_pay_on_delivery_success() {
    let app = at_payment_step().await;

    let (status, checkout) = app
        .post_json("/api/checkout/payment-method", &json!({"paymentMethod": "cod"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(checkout["paymentMethod"], "cod");

    let (status, checkout) = app.post_json("/api/checkout/confirm-cod", &json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(checkout["step"], "success");

    let sent = app.commerce.state().order_requests[0].clone();
    assert_eq!(sent["payment_method"], "cod");
    assert_eq!(sent["payment_method_title"], "Cash on Delivery");
    assert_eq!(sent["set_paid"], false);
    assert!(app.payments.state().created.is_empty());
}

#[tokio::test]
async fn test_switching_to_pay_on_delivery_drops_card_record() {
    let app = at_payment_step().await;
    enter_card_payment(&app).await;
    assert_eq!(app.state.pending_orders().list(false, 10).await.unwrap().len(), 1);

    app.post_json("/api/checkout/payment-method", &json!({"paymentMethod": "cod"}))
        .await;
    let (status, checkout) = app.post_json("/api/checkout/confirm-cod", &json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(checkout["step"], "success");
    assert!(app.state.pending_orders().list(false, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_restarting_checkout_drops_unpaid_record() {
    let app = at_payment_step().await;
    enter_card_payment(&app).await;

    let (status, checkout) = app.post_json("/api/checkout/start", &json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(checkout["step"], "shipping");
    assert!(app.state.pending_orders().list(false, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_pay_on_delivery_failure_keeps_cart() {
    let app = at_payment_step().await;
    app.post_json("/api/checkout/payment-method", &json!({"paymentMethod": "cod"}))
        .await;
    app.commerce.fail_orders(1);

    let (status, checkout) = app.post_json("/api/checkout/confirm-cod", &json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(checkout["step"], "payment");
    assert_eq!(checkout["error"], "Failed to create order. Please try again.");

    let (_, count) = app.get_json("/api/cart/count").await;
    assert_eq!(count["count"], 1);
}

#[tokio::test]
async fn test_empty_cart_cannot_pay() {
    let app = TestStorefront::start().await;
    app.post_json("/api/checkout/start", &json!({})).await;
    app.post_json("/api/checkout/shipping", &customer()).await;

    let (status, body) = app.post_json("/api/checkout/payment", &json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    assert!(app.payments.state().created.is_empty());
}
