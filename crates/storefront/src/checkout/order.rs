//! Mapping checkout input onto the commerce order payload.

use threadline_core::{CartLineItem, CustomerInfo, PaymentMethod};

use crate::commerce::{
    BillingAddress, CreateOrderRequest, MetaData, OrderLineItem, ShippingAddress,
};
use crate::db::pending_orders::PAYMENT_INTENT_META_KEY;

/// Country recorded when the customer left it blank.
pub const DEFAULT_COUNTRY: &str = "PK";

/// Build the order payload for a set of cart lines.
///
/// Billing and shipping both come from `customer`. Line items reference
/// product ids only; the commerce platform prices them.
#[must_use]
pub fn build_order_request(
    items: &[CartLineItem],
    customer: &CustomerInfo,
    method: PaymentMethod,
    paid: bool,
    payment_intent_id: Option<&str>,
) -> CreateOrderRequest {
    let country = if customer.country.trim().is_empty() {
        DEFAULT_COUNTRY.to_string()
    } else {
        customer.country.clone()
    };

    let billing = BillingAddress {
        first_name: customer.first_name.clone(),
        last_name: customer.last_name.clone(),
        email: customer.email.clone(),
        phone: customer.phone.clone(),
        address_1: customer.address.clone(),
        city: customer.city.clone(),
        postcode: customer.postal_code.clone(),
        country: country.clone(),
    };

    let shipping = ShippingAddress {
        first_name: customer.first_name.clone(),
        last_name: customer.last_name.clone(),
        address_1: customer.address.clone(),
        city: customer.city.clone(),
        postcode: customer.postal_code.clone(),
        country,
    };

    let line_items = items
        .iter()
        .map(|item| OrderLineItem {
            product_id: item.product_id,
            quantity: item.quantity,
        })
        .collect();

    let meta_data = payment_intent_id
        .map(|id| MetaData {
            key: PAYMENT_INTENT_META_KEY.to_string(),
            value: id.to_string(),
        })
        .into_iter()
        .collect();

    CreateOrderRequest {
        payment_method: method.as_str().to_string(),
        payment_method_title: method.title().to_string(),
        set_paid: paid,
        billing,
        shipping,
        line_items,
        customer_note: None,
        meta_data,
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use threadline_core::ProductId;

    use super::*;

    fn customer() -> CustomerInfo {
        CustomerInfo {
            first_name: "Bilal".to_string(),
            last_name: "Raza".to_string(),
            email: "bilal@example.com".to_string(),
            phone: "03211234567".to_string(),
            address: "House 4, Street 9".to_string(),
            city: "Islamabad".to_string(),
            postal_code: "44000".to_string(),
            country: String::new(),
        }
    }

    fn item(id: i64, quantity: u32) -> CartLineItem {
        CartLineItem {
            product_id: ProductId::new(id),
            quantity,
            unit_price: Decimal::from(1000),
            name: format!("Item {id}"),
            image_url: String::new(),
            category: String::new(),
        }
    }

    #[test]
    fn test_card_order_carries_intent_meta() {
        let request = build_order_request(
            &[item(3, 2), item(5, 1)],
            &customer(),
            PaymentMethod::HostedCard,
            true,
            Some("pi_42"),
        );

        assert_eq!(request.payment_method, "stripe");
        assert_eq!(request.payment_method_title, "Credit/Debit Card (Stripe)");
        assert!(request.set_paid);
        assert_eq!(request.line_items.len(), 2);
        assert_eq!(request.line_items[0].quantity, 2);
        assert_eq!(request.meta(PAYMENT_INTENT_META_KEY), Some("pi_42"));
    }

    #[test]
    fn test_country_defaults_and_addresses_match() {
        let request = build_order_request(
            &[item(1, 1)],
            &customer(),
            PaymentMethod::PayOnDelivery,
            false,
            None,
        );

        assert_eq!(request.billing.country, DEFAULT_COUNTRY);
        assert_eq!(request.shipping.country, DEFAULT_COUNTRY);
        assert_eq!(request.billing.address_1, request.shipping.address_1);
        assert_eq!(request.billing.postcode, "44000");
        assert_eq!(request.payment_method_title, "Cash on Delivery");
        assert!(!request.set_paid);
        assert!(request.meta_data.is_empty());
    }
}
