//! Payment processor integration.
//!
//! The storefront only creates and inspects payment intents. Card details
//! are collected and confirmed by the processor's hosted element in the
//! browser, which then reports the intent id back to
//! `POST /api/checkout/confirm-card`.

mod stripe;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use threadline_core::{CartLineItem, CurrencyCode, CustomerInfo};

pub use stripe::StripeClient;

/// Errors that can occur when talking to the payment processor.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// No secret key is configured.
    #[error("Payment processor is not configured")]
    NotConfigured,

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The processor rejected the request.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Intent id supplied by the browser is malformed.
    #[error("Invalid payment intent id: {0}")]
    InvalidIntentId(String),
}

/// Parameters for a new payment intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntentRequest {
    /// Amount in minor units.
    pub amount: i64,
    pub currency: CurrencyCode,
    pub metadata: BTreeMap<String, String>,
    /// Sent as the processor's idempotency key so a retried request cannot
    /// create a second intent.
    pub idempotency_key: Option<String>,
}

impl PaymentIntentRequest {
    /// Build the intent for a set of cart lines.
    ///
    /// Amount is `Σ(unit_price × quantity)` in minor units. Metadata carries
    /// the customer's contact and shipping fields and the line count.
    #[must_use]
    pub fn for_items(
        items: &[CartLineItem],
        customer: &CustomerInfo,
        currency: CurrencyCode,
        pending_reference: Option<&str>,
    ) -> Self {
        let total: rust_decimal::Decimal = items.iter().map(CartLineItem::line_total).sum();

        let mut metadata = BTreeMap::new();
        metadata.insert("customer_name".to_string(), customer.full_name());
        metadata.insert("customer_email".to_string(), customer.email.clone());
        metadata.insert("customer_phone".to_string(), customer.phone.clone());
        metadata.insert("shipping_address".to_string(), customer.address.clone());
        metadata.insert("shipping_city".to_string(), customer.city.clone());
        metadata.insert("shipping_postal".to_string(), customer.postal_code.clone());
        metadata.insert("shipping_country".to_string(), customer.country.clone());
        metadata.insert("items_count".to_string(), items.len().to_string());
        if let Some(reference) = pending_reference {
            metadata.insert("pending_order_reference".to_string(), reference.to_string());
        }

        Self {
            amount: currency.to_minor_units(total),
            currency,
            metadata,
            idempotency_key: pending_reference.map(|r| format!("intent-{r}")),
        }
    }
}

/// A created payment intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    /// Handed to the browser to mount the hosted payment element.
    pub client_secret: String,
}

/// Terminal (or pending) state reported for an intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentIntentStatus {
    Succeeded,
    Processing,
    RequiresPaymentMethod,
    Other(String),
}

impl PaymentIntentStatus {
    #[must_use]
    pub fn from_wire(value: &str) -> Self {
        match value {
            "succeeded" => Self::Succeeded,
            "processing" => Self::Processing,
            "requires_payment_method" => Self::RequiresPaymentMethod,
            other => Self::Other(other.to_string()),
        }
    }

    /// Message shown when a payment did not go through.
    #[must_use]
    pub fn customer_message(&self) -> &'static str {
        match self {
            Self::Succeeded => "Payment succeeded.",
            Self::Processing => "Your payment is processing.",
            Self::RequiresPaymentMethod => {
                "Your payment was not successful, please try again."
            }
            Self::Other(_) => "Something went wrong with your payment.",
        }
    }
}

/// A payment processor that can create and inspect intents.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Create a payment intent.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError` if the processor is unconfigured or rejects the
    /// request.
    async fn create_intent(&self, request: &PaymentIntentRequest) -> Result<PaymentIntent, PaymentError>;

    /// Fetch an intent's current status.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError` if the lookup fails.
    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntentStatus, PaymentError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use threadline_core::ProductId;

    fn line(id: i64, price: Decimal, quantity: u32) -> CartLineItem {
        CartLineItem {
            product_id: ProductId::new(id),
            quantity,
            unit_price: price,
            name: format!("Item {id}"),
            image_url: String::new(),
            category: String::new(),
        }
    }

    #[test]
    fn test_intent_amount_in_minor_units() {
        let items = vec![
            line(1, Decimal::new(199_999, 2), 2), // 1999.99 x 2
            line(2, Decimal::from(500), 1),
        ];
        let customer = CustomerInfo {
            first_name: "Sara".to_string(),
            last_name: "Ahmed".to_string(),
            city: "Karachi".to_string(),
            ..CustomerInfo::default()
        };

        let request = PaymentIntentRequest::for_items(&items, &customer, CurrencyCode::PKR, Some("abc"));
        assert_eq!(request.amount, 449_998);
        assert_eq!(request.metadata["customer_name"], "Sara Ahmed");
        assert_eq!(request.metadata["shipping_city"], "Karachi");
        assert_eq!(request.metadata["items_count"], "2");
        assert_eq!(request.metadata["pending_order_reference"], "abc");
        assert_eq!(request.idempotency_key.as_deref(), Some("intent-abc"));
    }

    #[test]
    fn test_status_from_wire() {
        assert_eq!(PaymentIntentStatus::from_wire("succeeded"), PaymentIntentStatus::Succeeded);
        assert_eq!(
            PaymentIntentStatus::from_wire("requires_capture"),
            PaymentIntentStatus::Other("requires_capture".to_string())
        );
    }
}
