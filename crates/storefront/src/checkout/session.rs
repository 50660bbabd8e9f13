//! Per-visitor checkout state.

use rand::Rng;
use serde::{Deserialize, Serialize};
use threadline_core::{CartLineItem, CustomerInfo, PaymentMethod};
use tower_sessions::Session;
use uuid::Uuid;

use super::CheckoutError;
use crate::commerce::OrderSummary;
use crate::payments::PaymentIntent;

/// Session key for the checkout state.
pub const CHECKOUT_KEY: &str = "checkout";

const FALLBACK_REFERENCE_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Checkout step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutStep {
    #[default]
    Shipping,
    Payment,
    Success,
}

impl CheckoutStep {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Shipping => "shipping",
            Self::Payment => "payment",
            Self::Success => "success",
        }
    }
}

impl std::fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Random 9-character uppercase base-36 reference for support correlation.
#[must_use]
pub fn generate_fallback_reference() -> String {
    let mut rng = rand::rng();
    (0..FALLBACK_REFERENCE_LEN)
        .filter_map(|_| BASE36.get(rng.random_range(0..BASE36.len())).copied())
        .map(char::from)
        .collect()
}

/// State of one checkout attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    /// Key for the submission guard.
    pub id: Uuid,
    pub step: CheckoutStep,
    pub customer: CustomerInfo,
    pub payment_method: PaymentMethod,
    pub payment_intent: Option<PaymentIntent>,
    pub pending_reference: Option<Uuid>,
    /// Cart lines captured before the cart is cleared.
    pub items_snapshot: Vec<CartLineItem>,
    pub order: Option<OrderSummary>,
    pub fallback_reference: String,
    /// Non-blocking notice shown on the success step.
    pub order_warning: Option<String>,
    /// Blocking message shown on the current step.
    pub error: Option<String>,
}

impl Default for CheckoutSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckoutSession {
    /// Fresh checkout on the shipping step.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            step: CheckoutStep::Shipping,
            customer: CustomerInfo::default(),
            payment_method: PaymentMethod::default(),
            payment_intent: None,
            pending_reference: None,
            items_snapshot: Vec::new(),
            order: None,
            fallback_reference: generate_fallback_reference(),
            order_warning: None,
            error: None,
        }
    }

    /// Load the checkout from the session, or start a new one.
    ///
    /// # Errors
    ///
    /// Returns the session error if the store cannot be read.
    pub async fn load(session: &Session) -> Result<Self, tower_sessions::session::Error> {
        Ok(session
            .get::<Self>(CHECKOUT_KEY)
            .await?
            .unwrap_or_default())
    }

    /// Write the checkout back to the session.
    ///
    /// # Errors
    ///
    /// Returns the session error if the store cannot be written.
    pub async fn save(&self, session: &Session) -> Result<(), tower_sessions::session::Error> {
        session.insert(CHECKOUT_KEY, self).await
    }

    pub(crate) fn expect_step(&self, expected: CheckoutStep) -> Result<(), CheckoutError> {
        if self.step == expected {
            Ok(())
        } else {
            Err(CheckoutError::InvalidStep {
                expected,
                actual: self.step,
            })
        }
    }

    /// Record customer details and move to payment.
    ///
    /// The details are kept even when required fields are missing, but the
    /// step does not change.
    ///
    /// # Errors
    ///
    /// `MissingFields` if any required field is empty, `InvalidStep` outside
    /// the shipping step.
    pub fn submit_shipping(&mut self, customer: CustomerInfo) -> Result<(), CheckoutError> {
        self.expect_step(CheckoutStep::Shipping)?;
        let missing = customer.missing_required_fields();
        self.customer = customer;
        if !missing.is_empty() {
            return Err(CheckoutError::MissingFields(missing));
        }
        self.error = None;
        self.step = CheckoutStep::Payment;
        Ok(())
    }

    /// Go back from payment to shipping. Payment state is kept.
    ///
    /// # Errors
    ///
    /// `InvalidStep` outside the payment step.
    pub fn edit_shipping(&mut self) -> Result<(), CheckoutError> {
        self.expect_step(CheckoutStep::Payment)?;
        self.step = CheckoutStep::Shipping;
        Ok(())
    }

    /// Choose how the customer pays.
    ///
    /// # Errors
    ///
    /// `InvalidStep` once the checkout has completed.
    pub fn select_payment_method(&mut self, method: PaymentMethod) -> Result<(), CheckoutError> {
        if self.step == CheckoutStep::Success {
            return Err(CheckoutError::InvalidStep {
                expected: CheckoutStep::Payment,
                actual: self.step,
            });
        }
        self.payment_method = method;
        self.error = None;
        Ok(())
    }

    pub(crate) fn complete(&mut self, order: Option<OrderSummary>) {
        self.order = order;
        self.error = None;
        self.step = CheckoutStep::Success;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn complete_customer() -> CustomerInfo {
        CustomerInfo {
            first_name: "Hina".to_string(),
            last_name: "Malik".to_string(),
            email: "hina@example.com".to_string(),
            phone: "03331234567".to_string(),
            address: "7 Canal View".to_string(),
            city: "Lahore".to_string(),
            postal_code: "54000".to_string(),
            country: "PK".to_string(),
        }
    }

    #[test]
    fn test_fallback_reference_shape() {
        let reference = generate_fallback_reference();
        assert_eq!(reference.len(), 9);
        assert!(
            reference
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
        );
    }

    #[test]
    fn test_incomplete_shipping_stays_on_shipping() {
        let mut checkout = CheckoutSession::new();
        let mut customer = complete_customer();
        customer.phone.clear();

        let err = checkout.submit_shipping(customer).unwrap_err();
        assert!(matches!(err, CheckoutError::MissingFields(ref f) if f == &vec!["phone"]));
        assert_eq!(checkout.step, CheckoutStep::Shipping);
        assert_eq!(checkout.customer.first_name, "Hina");
    }

    #[test]
    fn test_complete_shipping_moves_to_payment() {
        let mut checkout = CheckoutSession::new();
        checkout.submit_shipping(complete_customer()).unwrap();
        assert_eq!(checkout.step, CheckoutStep::Payment);
    }

    #[test]
    fn test_edit_shipping_keeps_payment_state() {
        let mut checkout = CheckoutSession::new();
        checkout.submit_shipping(complete_customer()).unwrap();
        checkout.payment_intent = Some(PaymentIntent {
            id: "pi_1".to_string(),
            client_secret: "pi_1_secret".to_string(),
        });

        checkout.edit_shipping().unwrap();
        assert_eq!(checkout.step, CheckoutStep::Shipping);
        assert!(checkout.payment_intent.is_some());
    }

    #[test]
    fn test_edit_shipping_only_from_payment() {
        let mut checkout = CheckoutSession::new();
        assert!(matches!(
            checkout.edit_shipping(),
            Err(CheckoutError::InvalidStep {
                expected: CheckoutStep::Payment,
                actual: CheckoutStep::Shipping
            })
        ));
    }

    #[test]
    fn test_serialized_shape() {
        let checkout = CheckoutSession::new();
        let json = serde_json::to_value(&checkout).unwrap();
        assert_eq!(json["step"], "shipping");
        assert_eq!(json["paymentMethod"], "stripe");
        assert!(json["fallbackReference"].is_string());
    }
}
