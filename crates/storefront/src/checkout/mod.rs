//! Checkout orchestration.
//!
//! Drives a [`CheckoutSession`] from shipping through payment to success.
//!
//! # Card payments
//!
//! Entering the payment step with the hosted card method writes a
//! [`PendingOrder`] to the ledger *before* the payment intent is created.
//! When the browser reports a confirmed payment, the record is flagged paid
//! and claimed, and the order is created with a bounded retry. The claim
//! keeps the reconciler off the record while the retry runs. If creation
//! still fails the claim is released, the record stays in the ledger for the
//! reconciler and the customer lands on the success step with a warning and
//! a support reference.
//!
//! # Pay on delivery
//!
//! No processor interaction. The order is created unpaid in a single attempt
//! and the checkout only completes if that succeeds. An unpaid record left by
//! an earlier card attempt is dropped on success.

mod guard;
mod order;
mod session;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use threadline_core::{CartLineItem, CurrencyCode, PaymentMethod};
use tracing::{error, info, instrument, warn};

use crate::cart::{CartStorage, CartStore};
use crate::commerce::{CreateOrderRequest, OrderBackend, OrderSummary};
use crate::db::{PendingOrder, PendingOrderStore, RepositoryError, claim_deadline};
use crate::payments::{PaymentError, PaymentIntentRequest, PaymentIntentStatus, PaymentProcessor};

pub use guard::{SubmissionGuard, SubmissionPermit};
pub use order::{DEFAULT_COUNTRY, build_order_request};
pub use session::{CHECKOUT_KEY, CheckoutSession, CheckoutStep, generate_fallback_reference};

/// Attempts at creating the order after a confirmed card payment.
pub const ORDER_CREATE_ATTEMPTS: u32 = 3;

const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(250);

pub const PAYMENT_INIT_FAILED: &str = "Failed to initialize payment. Please try again.";
pub const PAYMENT_VERIFY_FAILED: &str = "Unable to verify your payment. Please try again.";
pub const ORDER_SAVE_FAILED: &str = "Failed to save order. Please contact support.";
pub const ORDER_CREATE_FAILED: &str = "Failed to create order. Please try again.";

/// Checkout precondition failures.
///
/// Upstream failures the customer can act on are recorded on the session's
/// `error`/`order_warning` instead.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("A submission for this checkout is already in progress")]
    SubmissionInProgress,

    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Checkout is on the {actual} step, expected {expected}")]
    InvalidStep {
        expected: CheckoutStep,
        actual: CheckoutStep,
    },

    #[error("Payment method {0} does not support this action")]
    WrongPaymentMethod(PaymentMethod),

    #[error("Payment intent does not belong to this checkout")]
    IntentMismatch,

    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Coordinates the payment processor, order backend and pending-order ledger.
#[derive(Clone)]
pub struct CheckoutOrchestrator {
    payments: Arc<dyn PaymentProcessor>,
    orders: Arc<dyn OrderBackend>,
    pending: Arc<dyn PendingOrderStore>,
    guard: SubmissionGuard,
    currency: CurrencyCode,
    retry_backoff: Duration,
}

impl CheckoutOrchestrator {
    #[must_use]
    pub fn new(
        payments: Arc<dyn PaymentProcessor>,
        orders: Arc<dyn OrderBackend>,
        pending: Arc<dyn PendingOrderStore>,
        currency: CurrencyCode,
    ) -> Self {
        Self {
            payments,
            orders,
            pending,
            guard: SubmissionGuard::new(),
            currency,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    /// Delay between order creation attempts (multiplied by attempt number).
    #[must_use]
    pub const fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    #[must_use]
    pub const fn guard(&self) -> &SubmissionGuard {
        &self.guard
    }

    fn acquire(&self, checkout: &CheckoutSession) -> Result<SubmissionPermit, CheckoutError> {
        self.guard
            .try_acquire(checkout.id)
            .ok_or(CheckoutError::SubmissionInProgress)
    }

    /// Drop the checkout's ledger record unless it has been paid.
    pub async fn discard_unpaid(&self, checkout: &mut CheckoutSession) {
        let Some(reference) = checkout.pending_reference.take() else {
            return;
        };
        match self.pending.delete_unpaid(reference).await {
            Ok(true) => info!(%reference, "Dropped unpaid pending order"),
            Ok(false) => {}
            Err(e) => warn!(%reference, error = %e, "Failed to drop unpaid pending order"),
        }
    }

    /// Live cart lines, falling back to the checkout's snapshot.
    fn order_items<S: CartStorage>(
        checkout: &CheckoutSession,
        cart: &CartStore<S>,
    ) -> Result<Vec<CartLineItem>, CheckoutError> {
        let live = cart.snapshot();
        if !live.is_empty() {
            return Ok(live.items().to_vec());
        }
        if !checkout.items_snapshot.is_empty() {
            return Ok(checkout.items_snapshot.clone());
        }
        Err(CheckoutError::EmptyCart)
    }

    /// Prepare the payment step.
    ///
    /// For the hosted card method with no intent yet: snapshot the cart,
    /// persist a pending-order record, then create the payment intent. A
    /// processor failure is recorded on `checkout.error` and the checkout
    /// stays on the payment step.
    ///
    /// # Errors
    ///
    /// `InvalidStep`, `EmptyCart`, `SubmissionInProgress`, or `Repository`
    /// if the pending-order record cannot be written.
    #[instrument(skip_all, fields(checkout_id = %checkout.id))]
    pub async fn enter_payment<S: CartStorage>(
        &self,
        checkout: &mut CheckoutSession,
        cart: &CartStore<S>,
    ) -> Result<(), CheckoutError> {
        checkout.expect_step(CheckoutStep::Payment)?;
        let _permit = self.acquire(checkout)?;

        if checkout.payment_method != PaymentMethod::HostedCard
            || checkout.payment_intent.is_some()
        {
            return Ok(());
        }

        let items = Self::order_items(checkout, cart)?;
        checkout.items_snapshot.clone_from(&items);
        checkout.error = None;

        // Unpaid record from an earlier failed attempt.
        self.discard_unpaid(checkout).await;

        let request = build_order_request(
            &items,
            &checkout.customer,
            PaymentMethod::HostedCard,
            true,
            None,
        );
        let record = PendingOrder::new(request);
        if let Err(e) = self.pending.insert(&record).await {
            error!(error = %e, "Failed to persist pending order");
            checkout.error = Some(PAYMENT_INIT_FAILED.to_string());
            return Err(e.into());
        }
        checkout.pending_reference = Some(record.reference);

        let reference = record.reference.to_string();
        let intent_request = PaymentIntentRequest::for_items(
            &items,
            &checkout.customer,
            self.currency,
            Some(&reference),
        );

        match self.payments.create_intent(&intent_request).await {
            Ok(intent) => {
                if let Err(e) = self
                    .pending
                    .attach_payment_intent(record.reference, &intent.id)
                    .await
                {
                    warn!(error = %e, "Failed to link payment intent to pending order");
                }
                info!(payment_intent_id = %intent.id, "Payment intent created");
                checkout.payment_intent = Some(intent);
            }
            Err(e) => {
                warn!(error = %e, "Failed to create payment intent");
                checkout.error = Some(PAYMENT_INIT_FAILED.to_string());
            }
        }

        Ok(())
    }

    /// Handle the processor's report that a card payment finished.
    ///
    /// On `Succeeded` the order is created (with retry) and the checkout
    /// completes regardless of the outcome. Any other status keeps the
    /// checkout on the payment step with a message.
    ///
    /// # Errors
    ///
    /// `InvalidStep`, `WrongPaymentMethod`, `IntentMismatch`,
    /// `SubmissionInProgress`, or `Payment` for a malformed intent id.
    #[instrument(skip_all, fields(checkout_id = %checkout.id, payment_intent_id = %intent_id))]
    pub async fn confirm_card_payment<S: CartStorage>(
        &self,
        checkout: &mut CheckoutSession,
        cart: &mut CartStore<S>,
        intent_id: &str,
    ) -> Result<(), CheckoutError> {
        checkout.expect_step(CheckoutStep::Payment)?;
        if checkout.payment_method != PaymentMethod::HostedCard {
            return Err(CheckoutError::WrongPaymentMethod(checkout.payment_method));
        }
        if checkout.payment_intent.as_ref().map(|i| i.id.as_str()) != Some(intent_id) {
            return Err(CheckoutError::IntentMismatch);
        }
        let _permit = self.acquire(checkout)?;

        let status = match self.payments.retrieve_intent(intent_id).await {
            Ok(status) => status,
            Err(e @ PaymentError::InvalidIntentId(_)) => return Err(e.into()),
            Err(e) => {
                warn!(error = %e, "Failed to verify payment intent");
                checkout.error = Some(PAYMENT_VERIFY_FAILED.to_string());
                return Ok(());
            }
        };

        if status != PaymentIntentStatus::Succeeded {
            info!(?status, "Payment not completed");
            checkout.error = Some(status.customer_message().to_string());
            return Ok(());
        }

        // Paid with nothing to order still completes; the ledger keeps the record.
        let items = Self::order_items(checkout, cart).unwrap_or_default();
        checkout.items_snapshot.clone_from(&items);

        let record = self.paid_record(checkout, &items, intent_id).await;
        let request = record.as_ref().map_or_else(
            || {
                build_order_request(
                    &items,
                    &checkout.customer,
                    PaymentMethod::HostedCard,
                    true,
                    Some(intent_id),
                )
            },
            PendingOrder::finalized_request,
        );

        match self.create_with_retry(&request).await {
            Ok(order) => {
                if let Some(record) = &record
                    && let Err(delete_err) = self.pending.delete(record.reference).await
                {
                    error!(
                        reference = %record.reference,
                        error = %delete_err,
                        "Failed to delete pending order"
                    );
                }
                info!(order_id = %order.id, order_number = %order.number, "Order created");
                checkout.order_warning = None;
                checkout.complete(Some(order));
            }
            Err(e) => {
                error!(
                    fallback_reference = %checkout.fallback_reference,
                    error = %e,
                    "Payment succeeded but order creation failed"
                );
                if let Some(record) = &record
                    && let Err(record_err) = self
                        .pending
                        .record_failure(record.reference, &e.to_string())
                        .await
                {
                    warn!(reference = %record.reference, error = %record_err, "Failed to record failure");
                }
                checkout.order_warning = Some(ORDER_SAVE_FAILED.to_string());
                checkout.complete(None);
            }
        }

        cart.clear().await;
        Ok(())
    }

    /// Create the order for a pay-on-delivery checkout.
    ///
    /// Succeeds to the success step only if the order is created; otherwise
    /// the checkout stays on payment with `error` set.
    ///
    /// # Errors
    ///
    /// `InvalidStep`, `WrongPaymentMethod`, `EmptyCart`, or
    /// `SubmissionInProgress`.
    #[instrument(skip_all, fields(checkout_id = %checkout.id))]
    pub async fn confirm_pay_on_delivery<S: CartStorage>(
        &self,
        checkout: &mut CheckoutSession,
        cart: &mut CartStore<S>,
    ) -> Result<(), CheckoutError> {
        checkout.expect_step(CheckoutStep::Payment)?;
        if checkout.payment_method != PaymentMethod::PayOnDelivery {
            return Err(CheckoutError::WrongPaymentMethod(checkout.payment_method));
        }
        let _permit = self.acquire(checkout)?;

        let items = Self::order_items(checkout, cart)?;
        checkout.items_snapshot.clone_from(&items);

        let request = build_order_request(
            &items,
            &checkout.customer,
            PaymentMethod::PayOnDelivery,
            false,
            None,
        );

        match self.orders.create_order(&request).await {
            Ok(order) => {
                info!(order_id = %order.id, order_number = %order.number, "Order created");
                self.discard_unpaid(checkout).await;
                checkout.complete(Some(order));
                cart.clear().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to create pay-on-delivery order");
                checkout.error = Some(ORDER_CREATE_FAILED.to_string());
            }
        }

        Ok(())
    }

    /// The paid ledger record for this checkout, created if it went missing.
    async fn paid_record(
        &self,
        checkout: &mut CheckoutSession,
        items: &[CartLineItem],
        intent_id: &str,
    ) -> Option<PendingOrder> {
        let existing = match checkout.pending_reference {
            Some(reference) => self.pending.get(reference).await.unwrap_or_else(|e| {
                warn!(error = %e, "Failed to load pending order");
                None
            }),
            None => None,
        };

        let mut record = existing.unwrap_or_else(|| {
            PendingOrder::new(build_order_request(
                items,
                &checkout.customer,
                PaymentMethod::HostedCard,
                true,
                None,
            ))
        });
        let linked = record.payment_intent_id.as_deref() == Some(intent_id);
        let claim_until = claim_deadline();
        record.payment_intent_id = Some(intent_id.to_string());
        record.paid = true;
        record.claimed_until = Some(claim_until);

        let stored = if checkout.pending_reference == Some(record.reference) {
            if !linked {
                if let Err(e) = self.pending.attach_payment_intent(record.reference, intent_id).await {
                    warn!(error = %e, "Failed to link payment intent to pending order");
                }
            }
            self.pending.mark_paid(record.reference, claim_until).await
        } else {
            self.pending.insert(&record).await
        };

        match stored {
            Ok(()) => {
                checkout.pending_reference = Some(record.reference);
                Some(record)
            }
            Err(e) => {
                error!(error = %e, "Failed to record paid pending order");
                None
            }
        }
    }

    async fn create_with_retry(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<OrderSummary, crate::commerce::CommerceError> {
        let mut attempt = 1;
        loop {
            match self.orders.create_order(request).await {
                Ok(order) => return Ok(order),
                Err(e) if attempt < ORDER_CREATE_ATTEMPTS => {
                    warn!(attempt, error = %e, "Order creation failed, retrying");
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
