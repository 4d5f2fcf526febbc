//! Order aggregate: a frozen snapshot of a cart at checkout time.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use super::cart::Cart;
use super::product::Size;

/// The only status exercised in this service; orders are immutable after
/// placement here.
pub const STATUS_PLACED: &str = "PLACED";

/// A cart line frozen at checkout: name and unit price are copied from the
/// product as it was at that moment, so later catalog edits never reprice
/// an existing order.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineItem {
    #[serde(rename = "product")]
    pub product_id: Uuid,
    pub name: String,
    pub size: Size,
    pub quantity: u32,
    #[serde(rename = "price")]
    pub unit_price: Decimal,
}

impl OrderLineItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    #[serde(rename = "user")]
    pub user_id: Option<Uuid>,
    pub guest_id: Option<String>,
    pub items: Vec<OrderLineItem>,
    pub address: String,
    pub total_price: Decimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CheckoutError {
    #[error("Address is required")]
    AddressRequired,
    #[error("Guest checkout requires guestId and a contact email.")]
    GuestContactRequired,
    #[error("Cart is empty")]
    EmptyCart,
}

impl Order {
    /// Snapshot the cart into a new order. The owner carries over from the
    /// cart; totals are summed in exact decimal arithmetic.
    pub fn from_cart(cart: &Cart, address: &str) -> Result<Order, CheckoutError> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let items: Vec<OrderLineItem> = cart
            .items
            .iter()
            .map(|line| OrderLineItem {
                product_id: line.product.id,
                name: line.product.name.clone(),
                size: line.size,
                quantity: line.quantity,
                unit_price: line.product.price,
            })
            .collect();
        let total_price = items.iter().map(OrderLineItem::line_total).sum();
        Ok(Order {
            id: Uuid::new_v4(),
            user_id: cart.user_id,
            guest_id: if cart.user_id.is_some() {
                None
            } else {
                cart.guest_id.clone()
            },
            items,
            address: address.to_string(),
            total_price,
            status: STATUS_PLACED.to_string(),
            created_at: Utc::now(),
        })
    }
}
