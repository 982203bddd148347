//! Order aggregate: order header, line items and lifecycle status.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::{Payment, RestaurantTable};
use crate::services::pricing;

/// Order lifecycle status.
///
/// `pending -> advance_paid -> confirmed -> completed`, with `cancelled` and
/// `failed` as exits from `pending`. Terminal states never transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    AdvancePaid,
    Confirmed,
    Completed,
    Cancelled,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::AdvancePaid => "advance_paid",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Failed => "failed",
        }
    }

    /// Completed, cancelled and failed orders never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Failed
        )
    }

    /// Whether the lifecycle permits moving from `self` to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        !self.is_terminal()
            && matches!(
                (self, next),
                (Pending, AdvancePaid)
                    | (Pending, Cancelled)
                    | (Pending, Failed)
                    | (AdvancePaid, Confirmed)
                    | (AdvancePaid, Completed)
                    | (Confirmed, Completed)
            )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Placed order.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: i64,
    pub table_id: i64,
    pub amount: Decimal,
    pub status: OrderStatus,
    pub reservation_time: DateTime<Utc>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Order {
    /// Portion charged online at placement.
    pub fn advance_amount(&self) -> Decimal {
        pricing::advance_portion(self.amount)
    }

    /// Portion settled at the restaurant.
    pub fn remaining_amount(&self) -> Decimal {
        pricing::remaining_portion(self.amount)
    }

    pub fn is_advance_paid(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::AdvancePaid | OrderStatus::Confirmed | OrderStatus::Completed
        )
    }

    pub fn is_completed(&self) -> bool {
        self.status == OrderStatus::Completed
    }
}

/// Line item with the unit price captured at order time.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: Uuid,
    pub menu_id: i64,
    pub quantity: i32,
    pub price: Decimal,
    pub created_utc: DateTime<Utc>,
}

/// Input for creating an order together with its stock reservation.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: i64,
    pub table_id: i64,
    pub amount: Decimal,
    pub reservation_time: DateTime<Utc>,
    pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub menu_id: i64,
    pub quantity: i32,
    pub price: Decimal,
}

/// Order with everything a client needs to render it.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub advance_amount: Decimal,
    pub remaining_amount: Decimal,
    pub is_advance_paid: bool,
    pub is_completed: bool,
    pub is_fully_paid: bool,
    pub items: Vec<OrderItem>,
    pub table: Option<RestaurantTable>,
    pub payment: Option<Payment>,
}

impl OrderDetails {
    pub fn new(
        order: Order,
        items: Vec<OrderItem>,
        table: Option<RestaurantTable>,
        payment: Option<Payment>,
    ) -> Self {
        Self {
            advance_amount: order.advance_amount(),
            remaining_amount: order.remaining_amount(),
            is_advance_paid: order.is_advance_paid(),
            is_completed: order.is_completed(),
            is_fully_paid: payment.as_ref().is_some_and(Payment::is_fully_paid),
            order,
            items,
            table,
            payment,
        }
    }
}
