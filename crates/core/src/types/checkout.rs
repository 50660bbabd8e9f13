//! Checkout input types shared by the storefront and CLI.

use serde::{Deserialize, Serialize};

/// Customer and shipping details collected on the shipping step.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomerInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

impl CustomerInfo {
    /// Names of required fields that are empty (after trimming).
    ///
    /// Country is optional. No format validation is applied.
    #[must_use]
    pub fn missing_required_fields(&self) -> Vec<&'static str> {
        [
            ("firstName", &self.first_name),
            ("lastName", &self.last_name),
            ("email", &self.email),
            ("phone", &self.phone),
            ("address", &self.address),
            ("city", &self.city),
            ("postalCode", &self.postal_code),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing_required_fields().is_empty()
    }

    /// `"First Last"`.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentMethod {
    /// Card payment through the processor's hosted element.
    #[default]
    #[serde(rename = "stripe")]
    HostedCard,
    /// Order is created unpaid and settled at delivery.
    #[serde(rename = "cod")]
    PayOnDelivery,
}

impl PaymentMethod {
    /// Wire identifier sent to the commerce platform.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::HostedCard => "stripe",
            Self::PayOnDelivery => "cod",
        }
    }

    /// Human-readable title recorded on the order.
    #[must_use]
    pub const fn title(&self) -> &'static str {
        match self {
            Self::HostedCard => "Credit/Debit Card (Stripe)",
            Self::PayOnDelivery => "Cash on Delivery",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn complete() -> CustomerInfo {
        CustomerInfo {
            first_name: "Ayesha".to_string(),
            last_name: "Khan".to_string(),
            email: "ayesha@example.com".to_string(),
            phone: "03001234567".to_string(),
            address: "12 Mall Road".to_string(),
            city: "Lahore".to_string(),
            postal_code: "54000".to_string(),
            country: String::new(),
        }
    }

    #[test]
    fn test_complete_customer_has_no_missing_fields() {
        assert!(complete().is_complete());
    }

    #[test]
    fn test_missing_fields_are_reported() {
        let mut customer = complete();
        customer.email = "  ".to_string();
        customer.postal_code.clear();
        assert_eq!(customer.missing_required_fields(), vec!["email", "postalCode"]);
    }

    #[test]
    fn test_customer_deserializes_camel_case() {
        let customer: CustomerInfo =
            serde_json::from_str(r#"{"firstName":"Ali","postalCode":"75500"}"#).unwrap();
        assert_eq!(customer.first_name, "Ali");
        assert_eq!(customer.postal_code, "75500");
        assert!(customer.last_name.is_empty());
    }

    #[test]
    fn test_payment_method_wire_names() {
        let method: PaymentMethod = serde_json::from_str("\"cod\"").unwrap();
        assert_eq!(method, PaymentMethod::PayOnDelivery);
        assert_eq!(PaymentMethod::HostedCard.title(), "Credit/Debit Card (Stripe)");
        assert_eq!(PaymentMethod::default(), PaymentMethod::HostedCard);
    }
}
