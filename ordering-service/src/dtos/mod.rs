//! Request and response bodies for the HTTP API.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{MenuItem, Order, OrderDetails, OrderStatus, Payment, StockScope};

// -----------------------------------------------------------------------------
// Orders
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub table_id: i64,
    /// Advance (50%) amount; the order total is derived from it.
    pub amount: Decimal,
    pub reservation_time: DateTime<Utc>,
    #[validate(length(min = 1), nested)]
    pub order_items: Vec<OrderItemRequest>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct OrderItemRequest {
    pub menu_id: i64,
    #[validate(range(min = 1, max = 10000))]
    pub quantity: i32,
    pub price: Decimal,
}

#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub order_id: Uuid,
    pub snap_url: String,
    pub snap_token: String,
    pub amount: Decimal,
    pub advance_amount: Decimal,
    pub remaining_amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct OrderListResponse {
    pub orders: Vec<OrderDetails>,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub order: OrderDetails,
}

#[derive(Debug, Deserialize)]
pub struct CancelOrderRequest {
    pub order_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CancelOrderResponse {
    pub message: String,
    pub order: Order,
}

// -----------------------------------------------------------------------------
// Payments
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct PaymentStatusQuery {
    pub order_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct PaymentStatusResponse {
    pub order_id: Uuid,
    pub order_status: OrderStatus,
    pub payment: Option<Payment>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CompleteRemainingRequest {
    pub order_id: Uuid,
    /// cash, card, ...
    #[validate(length(min = 1, max = 50))]
    pub payment_method: String,
    pub staff_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CompleteRemainingResponse {
    pub message: String,
    pub order: Order,
    pub payment: Option<Payment>,
    pub total_paid: Decimal,
    pub advance_paid: Decimal,
    pub remaining_paid: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmArrivalRequest {
    pub order_id: Uuid,
    pub staff_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ConfirmArrivalResponse {
    pub message: String,
    pub order: Order,
    pub remaining_amount_due: Decimal,
}

#[derive(Debug, Serialize)]
pub struct NotificationAck {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_status: Option<OrderStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effect: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

// -----------------------------------------------------------------------------
// Menus
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct MenuQuery {
    pub restaurant_id: Option<i64>,
    pub stock: Option<StockScope>,
}

#[derive(Debug, Serialize)]
pub struct MenuListing {
    #[serde(flatten)]
    pub item: MenuItem,
    pub is_available: bool,
    pub is_out_of_stock: bool,
}

impl From<MenuItem> for MenuListing {
    fn from(item: MenuItem) -> Self {
        Self {
            is_available: !item.is_out_of_stock(),
            is_out_of_stock: item.is_out_of_stock(),
            item,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_order_requires_items_with_positive_quantity() {
        let empty: CreateOrderRequest = serde_json::from_value(serde_json::json!({
            "table_id": 1,
            "amount": "10000",
            "reservation_time": "2025-07-01T19:00:00Z",
            "order_items": []
        }))
        .unwrap();
        assert!(empty.validate().is_err());

        let zero: CreateOrderRequest = serde_json::from_value(serde_json::json!({
            "table_id": 1,
            "amount": 10000,
            "reservation_time": "2025-07-01T19:00:00Z",
            "order_items": [{ "menu_id": 1, "quantity": 0, "price": 5000 }]
        }))
        .unwrap();
        assert!(zero.validate().is_err());

        let ok: CreateOrderRequest = serde_json::from_value(serde_json::json!({
            "table_id": 1,
            "amount": 10000,
            "reservation_time": "2025-07-01T19:00:00Z",
            "order_items": [{ "menu_id": 1, "quantity": 2, "price": 5000 }]
        }))
        .unwrap();
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn line_quantity_is_capped() {
        let huge: CreateOrderRequest = serde_json::from_value(serde_json::json!({
            "table_id": 1,
            "amount": 10000,
            "reservation_time": "2025-07-01T19:00:00Z",
            "order_items": [
                { "menu_id": 1, "quantity": i32::MAX, "price": 5000 },
                { "menu_id": 1, "quantity": i32::MAX, "price": 5000 }
            ]
        }))
        .unwrap();
        assert!(huge.validate().is_err());

        let line: OrderItemRequest = serde_json::from_value(serde_json::json!({
            "menu_id": 1, "quantity": 10000, "price": 5000
        }))
        .unwrap();
        assert!(line.validate().is_ok());
        assert_eq!(serde_json::to_value(&line).unwrap()["quantity"], 10000);
    }

    #[test]
    fn stock_scope_parses_from_query_values() {
        let query: MenuQuery =
            serde_json::from_value(serde_json::json!({ "stock": "out_of_stock" })).unwrap();
        assert_eq!(query.stock, Some(StockScope::OutOfStock));
    }
}
