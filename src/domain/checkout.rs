//! Turns a cart plus shipping/customer details into an order draft.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{CustomerDetails, LineItem};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CheckoutError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("cart is empty")]
    EmptyCart,
    #[error("cart line {index} is invalid: {reason}")]
    InvalidLine { index: usize, reason: &'static str },
    #[error("order total overflows")]
    TotalOverflow,
}

/// Everything the payment handshake and the order writer need, carried
/// through the session as one serialized value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub transaction_ref: String,
    pub total_amount: i64,
    pub currency: String,
    pub cart_items: Vec<LineItem>,
    pub shipping_address: String,
    pub customer: CustomerDetails,
}

/// Required-field check. Runs before anything touches the database.
pub fn validate_details(
    shipping_address: &str,
    customer: &CustomerDetails,
) -> Result<(), CheckoutError> {
    let required = [
        ("shipping_address", shipping_address),
        ("first_name", customer.first_name.as_str()),
        ("last_name", customer.last_name.as_str()),
        ("email", customer.email.as_str()),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(CheckoutError::MissingField(field));
        }
    }
    Ok(())
}

pub fn cart_total(items: &[LineItem]) -> Result<i64, CheckoutError> {
    if items.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    items
        .iter()
        .enumerate()
        .try_fold(0_i64, |acc, (index, item)| {
            if item.quantity <= 0 {
                return Err(CheckoutError::InvalidLine {
                    index,
                    reason: "quantity must be greater than 0",
                });
            }
            if item.price < 0 {
                return Err(CheckoutError::InvalidLine {
                    index,
                    reason: "price must not be negative",
                });
            }
            item.price
                .checked_mul(i64::from(item.quantity))
                .and_then(|line| acc.checked_add(line))
                .ok_or(CheckoutError::TotalOverflow)
        })
}

pub fn generate_transaction_ref(now: DateTime<Utc>) -> String {
    let date = now.format("%Y%m%d");
    let suffix = Uuid::new_v4().simple().to_string();
    format!("TX-{}-{}", date, &suffix[..12])
}

pub fn compose_order_draft(
    cart_items: Vec<LineItem>,
    shipping_address: String,
    customer: CustomerDetails,
    currency: &str,
    now: DateTime<Utc>,
) -> Result<OrderDraft, CheckoutError> {
    validate_details(&shipping_address, &customer)?;
    let total_amount = cart_total(&cart_items)?;

    Ok(OrderDraft {
        transaction_ref: generate_transaction_ref(now),
        total_amount,
        currency: currency.to_string(),
        cart_items,
        shipping_address: shipping_address.trim().to_string(),
        customer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer() -> CustomerDetails {
        CustomerDetails {
            first_name: "Abebe".into(),
            last_name: "Kebede".into(),
            email: "abebe@example.com".into(),
            phone: None,
        }
    }

    fn item(name: &str, price: i64, quantity: i32) -> LineItem {
        LineItem {
            item_id: Uuid::new_v4().to_string(),
            name: name.into(),
            price,
            quantity,
            variant: None,
        }
    }

    #[test]
    fn widget_example_totals_twenty() {
        let draft = compose_order_draft(
            vec![item("Widget", 10, 2)],
            "Addis Ababa".into(),
            customer(),
            "ETB",
            Utc::now(),
        )
        .unwrap();
        assert_eq!(draft.total_amount, 20);
        assert_eq!(draft.shipping_address, "Addis Ababa");
        assert!(draft.transaction_ref.starts_with("TX-"));
    }

    #[test]
    fn total_is_sum_of_price_times_quantity() {
        let items = vec![item("a", 250, 3), item("b", 1, 1), item("c", 999, 7)];
        let expected: i64 = items.iter().map(|i| i.price * i64::from(i.quantity)).sum();
        assert_eq!(cart_total(&items), Ok(expected));
    }

    #[test]
    fn empty_shipping_address_is_rejected() {
        let result = compose_order_draft(
            vec![item("Widget", 10, 2)],
            "   ".into(),
            customer(),
            "ETB",
            Utc::now(),
        );
        assert_eq!(result, Err(CheckoutError::MissingField("shipping_address")));
    }

    #[test]
    fn empty_customer_name_is_rejected() {
        let mut nameless = customer();
        nameless.first_name.clear();
        assert_eq!(
            validate_details("Addis Ababa", &nameless),
            Err(CheckoutError::MissingField("first_name"))
        );
    }

    #[test]
    fn empty_cart_and_bad_lines_are_rejected() {
        assert_eq!(cart_total(&[]), Err(CheckoutError::EmptyCart));
        assert!(matches!(
            cart_total(&[item("a", 10, 1), item("b", 10, 0)]),
            Err(CheckoutError::InvalidLine { index: 1, .. })
        ));
        assert_eq!(
            cart_total(&[item("a", i64::MAX, 2)]),
            Err(CheckoutError::TotalOverflow)
        );
    }

    #[test]
    fn transaction_refs_are_fresh() {
        let now = Utc::now();
        let a = generate_transaction_ref(now);
        let b = generate_transaction_ref(now);
        assert_ne!(a, b);
        assert_eq!(a.len(), "TX-20240101-".len() + 12);
    }
}
