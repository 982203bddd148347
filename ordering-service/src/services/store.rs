//! Storage boundary for ordering-service.
//!
//! Relationships between orders, items, payments, tables and menus are
//! explicit query functions here. Every method is one atomic unit against
//! the backing store.

use async_trait::async_trait;
use service_core::error::AppError;
use uuid::Uuid;

use crate::error::OrderingError;
use crate::models::{
    MenuItem, NewOrder, Order, OrderItem, OrderStatus, Payment, PaymentStatus, PaymentUpsert,
    RemainingPayment, RestaurantTable, StockScope, TableStatus,
};

/// A status change plus the side effects that go with it.
///
/// The store moves the order from `from` to `to` only if it is still in
/// `from`, and runs the side effects only when that update matched.
#[derive(Debug, Clone)]
pub struct Transition {
    pub from: OrderStatus,
    pub to: OrderStatus,
    /// Return every line item's quantity to stock.
    pub release_stock: bool,
    pub table_status: Option<TableStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub remaining_payment: Option<RemainingPayment>,
}

impl Transition {
    pub fn new(from: OrderStatus, to: OrderStatus) -> Self {
        Self {
            from,
            to,
            release_stock: false,
            table_status: None,
            payment_status: None,
            remaining_payment: None,
        }
    }

    pub fn releasing_stock(mut self) -> Self {
        self.release_stock = true;
        self
    }

    pub fn with_table(mut self, status: TableStatus) -> Self {
        self.table_status = Some(status);
        self
    }

    pub fn with_payment_status(mut self, status: PaymentStatus) -> Self {
        self.payment_status = Some(status);
        self
    }

    pub fn with_remaining_payment(mut self, remaining: RemainingPayment) -> Self {
        self.remaining_payment = Some(remaining);
        self
    }
}

/// Stock position of one order line after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLine {
    pub menu_id: i64,
    pub menu_name: String,
    pub quantity: i32,
    pub stock: i32,
}

#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    Applied { order: Order, lines: Vec<StockLine> },
    /// The order was no longer in the expected status; nothing changed.
    Stale { current: OrderStatus },
}

impl TransitionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied { .. })
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn health_check(&self) -> Result<(), AppError>;

    // Menus and inventory

    async fn get_menu_item(&self, menu_id: i64) -> Result<Option<MenuItem>, AppError>;

    async fn list_menu_items(
        &self,
        restaurant_id: Option<i64>,
        scope: Option<StockScope>,
    ) -> Result<Vec<MenuItem>, AppError>;

    // Tables

    async fn get_table(&self, table_id: i64) -> Result<Option<RestaurantTable>, AppError>;

    // Orders

    /// Insert the order and its items and reserve stock for every line, all
    /// or nothing. Fails with `InsufficientStock` if any reservation fails.
    async fn create_order(&self, order: &NewOrder) -> Result<Order, OrderingError>;

    async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>, AppError>;

    async fn list_order_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, AppError>;

    async fn list_orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, AppError>;

    /// Apply a guarded status transition and its side effects.
    async fn apply_transition(
        &self,
        order_id: Uuid,
        transition: &Transition,
    ) -> Result<TransitionOutcome, AppError>;

    // Payments

    async fn get_payment(&self, order_id: Uuid) -> Result<Option<Payment>, AppError>;

    /// Upsert the payment row for a gateway notification and, when given,
    /// apply the transition it implies, in one unit. New rows start as
    /// `pending`; the local status only changes through the transition.
    async fn reconcile_payment(
        &self,
        upsert: &PaymentUpsert,
        transition: Option<&Transition>,
    ) -> Result<(Payment, Option<TransitionOutcome>), AppError>;
}
