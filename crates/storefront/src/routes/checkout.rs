//! Checkout route handlers.
//!
//! Each handler loads the visitor's [`CheckoutSession`], applies one
//! transition, writes it back and returns it. The checkout is saved even
//! when the transition fails so messages set along the way survive.

use axum::{Json, extract::State};
use serde::Deserialize;
use threadline_core::{CustomerInfo, PaymentMethod};
use tower_sessions::Session;
use tracing::instrument;

use super::cart::open_cart;
use crate::checkout::{CheckoutError, CheckoutSession};
use crate::error::{Result, add_breadcrumb};
use crate::state::AppState;

/// Body of `POST /api/checkout/payment-method`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodRequest {
    pub payment_method: PaymentMethod,
}

/// Body of `POST /api/checkout/confirm-card`.
#[derive(Debug, Deserialize)]
pub struct ConfirmCardRequest {
    pub payment_intent_id: String,
}

/// Save the checkout, then surface the transition's outcome.
async fn finish(
    session: &Session,
    checkout: CheckoutSession,
    outcome: std::result::Result<(), CheckoutError>,
) -> Result<Json<CheckoutSession>> {
    checkout.save(session).await?;
    outcome?;
    Ok(Json(checkout))
}

/// Current checkout, started fresh if none exists.
#[instrument(skip(session))]
pub async fn show(session: Session) -> Result<Json<CheckoutSession>> {
    let checkout = CheckoutSession::load(&session).await?;
    finish(&session, checkout, Ok(())).await
}

/// Discard any previous checkout and start on the shipping step.
#[instrument(skip(state, session))]
pub async fn start(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<CheckoutSession>> {
    let mut previous = CheckoutSession::load(&session).await?;
    state.checkout().discard_unpaid(&mut previous).await;

    let checkout = CheckoutSession::new();
    add_breadcrumb("checkout", "Checkout started", None);
    finish(&session, checkout, Ok(())).await
}

/// Submit customer details and move to the payment step.
#[instrument(skip(session, customer))]
pub async fn submit_shipping(
    session: Session,
    Json(customer): Json<CustomerInfo>,
) -> Result<Json<CheckoutSession>> {
    let mut checkout = CheckoutSession::load(&session).await?;
    let outcome = checkout.submit_shipping(customer);
    finish(&session, checkout, outcome).await
}

/// Return to the shipping step.
#[instrument(skip(session))]
pub async fn edit_shipping(session: Session) -> Result<Json<CheckoutSession>> {
    let mut checkout = CheckoutSession::load(&session).await?;
    let outcome = checkout.edit_shipping();
    finish(&session, checkout, outcome).await
}

/// Choose how to pay.
#[instrument(skip(session))]
pub async fn select_payment_method(
    session: Session,
    Json(body): Json<PaymentMethodRequest>,
) -> Result<Json<CheckoutSession>> {
    let mut checkout = CheckoutSession::load(&session).await?;
    let outcome = checkout.select_payment_method(body.payment_method);
    finish(&session, checkout, outcome).await
}

/// Prepare the payment step (creates the card payment intent).
#[instrument(skip(state, session))]
pub async fn enter_payment(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<CheckoutSession>> {
    let mut checkout = CheckoutSession::load(&session).await?;
    let cart = open_cart(&session).await;
    let outcome = state.checkout().enter_payment(&mut checkout, &cart).await;
    finish(&session, checkout, outcome).await
}

/// The browser reports the hosted card payment finished.
#[instrument(skip(state, session), fields(payment_intent_id = %body.payment_intent_id))]
pub async fn confirm_card(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<ConfirmCardRequest>,
) -> Result<Json<CheckoutSession>> {
    let mut checkout = CheckoutSession::load(&session).await?;
    let mut cart = open_cart(&session).await;
    let outcome = state
        .checkout()
        .confirm_card_payment(&mut checkout, &mut cart, &body.payment_intent_id)
        .await;
    add_breadcrumb(
        "checkout",
        "Card payment confirmed",
        Some(&[("step", checkout.step.as_str())]),
    );
    finish(&session, checkout, outcome).await
}

/// Place a pay-on-delivery order.
#[instrument(skip(state, session))]
pub async fn confirm_cod(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<CheckoutSession>> {
    let mut checkout = CheckoutSession::load(&session).await?;
    let mut cart = open_cart(&session).await;
    let outcome = state
        .checkout()
        .confirm_pay_on_delivery(&mut checkout, &mut cart)
        .await;
    add_breadcrumb(
        "checkout",
        "Pay-on-delivery submitted",
        Some(&[("step", checkout.step.as_str())]),
    );
    finish(&session, checkout, outcome).await
}
