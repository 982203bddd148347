//! In-memory store for tests and local development.
//!
//! A single async mutex guards all state, so every `Store` call is atomic
//! with respect to every other.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::inventory;
use super::store::{StockLine, Store, Transition, TransitionOutcome};
use crate::error::OrderingError;
use crate::models::{
    carry_remaining_payment, MenuItem, NewOrder, Order, OrderItem, OrderStatus, Payment,
    PaymentStatus, PaymentUpsert, RestaurantTable, StockScope, TableStatus,
};

#[derive(Default)]
struct MemoryState {
    menus: BTreeMap<i64, MenuItem>,
    tables: BTreeMap<i64, RestaurantTable>,
    orders: HashMap<Uuid, Order>,
    items: Vec<OrderItem>,
    payments: HashMap<Uuid, Payment>,
    next_menu_id: i64,
    next_table_id: i64,
    next_item_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a menu item.
    pub async fn insert_menu_item(
        &self,
        restaurant_id: i64,
        name: &str,
        price: Decimal,
        stock: i32,
    ) -> MenuItem {
        let mut state = self.state.lock().await;
        state.next_menu_id += 1;
        let now = Utc::now();
        let item = MenuItem {
            id: state.next_menu_id,
            restaurant_id,
            name: name.to_string(),
            description: None,
            price,
            stock,
            category: None,
            created_utc: now,
            updated_utc: now,
        };
        state.menus.insert(item.id, item.clone());
        item
    }

    /// Seed an available table.
    pub async fn insert_table(&self, restaurant_id: i64, capacity: i32) -> RestaurantTable {
        let mut state = self.state.lock().await;
        state.next_table_id += 1;
        let now = Utc::now();
        let table = RestaurantTable {
            id: state.next_table_id,
            restaurant_id,
            capacity,
            status: TableStatus::Available,
            created_utc: now,
            updated_utc: now,
        };
        state.tables.insert(table.id, table.clone());
        table
    }

    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    pub async fn order_item_count(&self) -> usize {
        self.state.lock().await.items.len()
    }
}

impl MemoryState {
    /// Decrement stock if at least `quantity` is on hand.
    fn reserve(&mut self, menu_id: i64, quantity: i32) -> Result<i32, OrderingError> {
        let menu = self
            .menus
            .get_mut(&menu_id)
            .ok_or_else(|| OrderingError::validation("menu_id", "exists"))?;

        if !menu.is_in_stock(quantity) {
            return Err(OrderingError::InsufficientStock {
                menu_id,
                menu_name: menu.name.clone(),
                available: menu.stock,
                requested: quantity,
            });
        }

        menu.stock -= quantity;
        menu.updated_utc = Utc::now();
        Ok(menu.stock)
    }

    /// Increment stock. No upper bound is enforced.
    fn release(&mut self, menu_id: i64, quantity: i32) -> Option<&MenuItem> {
        let menu = self.menus.get_mut(&menu_id)?;
        menu.stock = menu.stock.saturating_add(quantity);
        menu.updated_utc = Utc::now();
        Some(menu)
    }

    fn apply_transition(
        &mut self,
        order_id: Uuid,
        transition: &Transition,
    ) -> Result<TransitionOutcome, AppError> {
        let now = Utc::now();
        let order = self
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Order {} not found", order_id)))?;

        if order.status != transition.from {
            return Ok(TransitionOutcome::Stale {
                current: order.status,
            });
        }

        order.status = transition.to;
        order.updated_utc = now;
        let order = order.clone();

        let ordered: Vec<(i64, i32)> = self
            .items
            .iter()
            .filter(|i| i.order_id == order_id)
            .map(|i| (i.menu_id, i.quantity))
            .collect();

        let mut lines = Vec::new();
        for (menu_id, quantity) in ordered {
            let menu = if transition.release_stock {
                self.release(menu_id, quantity)
            } else {
                self.menus.get(&menu_id)
            };
            if let Some(menu) = menu {
                lines.push(StockLine {
                    menu_id: menu.id,
                    menu_name: menu.name.clone(),
                    quantity,
                    stock: menu.stock,
                });
            }
        }

        if let Some(status) = transition.table_status {
            if let Some(table) = self.tables.get_mut(&order.table_id) {
                table.status = status;
                table.updated_utc = now;
            }
        }

        if let Some(payment) = self.payments.get_mut(&order_id) {
            if let Some(status) = transition.payment_status {
                payment.status = status;
                payment.updated_utc = now;
            }
            if let Some(remaining) = &transition.remaining_payment {
                payment.remaining_payment_method = Some(remaining.method.clone());
                payment.remaining_paid_by = remaining.staff_id;
                payment.remaining_paid_at = Some(remaining.completed_at);
                payment.payment_data = Some(remaining.merge_into(payment.payment_data.as_ref()));
                payment.updated_utc = now;
            }
        }

        Ok(TransitionOutcome::Applied { order, lines })
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn get_menu_item(&self, menu_id: i64) -> Result<Option<MenuItem>, AppError> {
        Ok(self.state.lock().await.menus.get(&menu_id).cloned())
    }

    async fn list_menu_items(
        &self,
        restaurant_id: Option<i64>,
        scope: Option<StockScope>,
    ) -> Result<Vec<MenuItem>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .menus
            .values()
            .filter(|m| restaurant_id.map_or(true, |r| m.restaurant_id == r))
            .filter(|m| scope.map_or(true, |s| s.matches(m)))
            .cloned()
            .collect())
    }

    async fn get_table(&self, table_id: i64) -> Result<Option<RestaurantTable>, AppError> {
        Ok(self.state.lock().await.tables.get(&table_id).cloned())
    }

    async fn create_order(&self, new_order: &NewOrder) -> Result<Order, OrderingError> {
        let mut state = self.state.lock().await;

        // Check every line before touching anything.
        let requested = inventory::requested_quantities(
            new_order.items.iter().map(|i| (i.menu_id, i.quantity)),
        )?;
        for (&menu_id, &quantity) in &requested {
            let menu = state
                .menus
                .get(&menu_id)
                .ok_or_else(|| OrderingError::validation("menu_id", "exists"))?;
            if !menu.is_in_stock(quantity) {
                return Err(OrderingError::InsufficientStock {
                    menu_id,
                    menu_name: menu.name.clone(),
                    available: menu.stock,
                    requested: quantity,
                });
            }
        }

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            user_id: new_order.user_id,
            table_id: new_order.table_id,
            amount: new_order.amount,
            status: OrderStatus::Pending,
            reservation_time: new_order.reservation_time,
            created_utc: now,
            updated_utc: now,
        };

        for item in &new_order.items {
            state.next_item_id += 1;
            let id = state.next_item_id;
            state.items.push(OrderItem {
                id,
                order_id: order.id,
                menu_id: item.menu_id,
                quantity: item.quantity,
                price: item.price,
                created_utc: now,
            });
        }
        for (menu_id, quantity) in requested {
            state.reserve(menu_id, quantity)?;
        }
        state.orders.insert(order.id, order.clone());

        Ok(order)
    }

    async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>, AppError> {
        Ok(self.state.lock().await.orders.get(&order_id).cloned())
    }

    async fn list_order_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .items
            .iter()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn list_orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, AppError> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));
        Ok(orders)
    }

    async fn apply_transition(
        &self,
        order_id: Uuid,
        transition: &Transition,
    ) -> Result<TransitionOutcome, AppError> {
        self.state
            .lock()
            .await
            .apply_transition(order_id, transition)
    }

    async fn get_payment(&self, order_id: Uuid) -> Result<Option<Payment>, AppError> {
        Ok(self.state.lock().await.payments.get(&order_id).cloned())
    }

    async fn reconcile_payment(
        &self,
        upsert: &PaymentUpsert,
        transition: Option<&Transition>,
    ) -> Result<(Payment, Option<TransitionOutcome>), AppError> {
        let mut state = self.state.lock().await;
        let now = Utc::now();

        if !state.orders.contains_key(&upsert.order_id) {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "Order {} not found",
                upsert.order_id
            )));
        }

        let payment = state
            .payments
            .entry(upsert.order_id)
            .or_insert_with(|| Payment {
                order_id: upsert.order_id,
                transaction_id: upsert.transaction_id.clone(),
                payment_type: None,
                payment_method: None,
                amount: upsert.amount,
                gross_amount: upsert.gross_amount,
                remaining_amount: upsert.remaining_amount,
                transaction_status: upsert.transaction_status.clone(),
                fraud_status: None,
                payment_data: None,
                status: PaymentStatus::Pending,
                remaining_payment_method: None,
                remaining_paid_by: None,
                remaining_paid_at: None,
                created_utc: now,
                updated_utc: now,
            });
        payment.transaction_id = upsert.transaction_id.clone();
        payment.payment_type = upsert.payment_type.clone();
        payment.payment_method = upsert.payment_type.clone();
        payment.amount = upsert.amount;
        payment.gross_amount = upsert.gross_amount;
        payment.remaining_amount = upsert.remaining_amount;
        payment.transaction_status = upsert.transaction_status.clone();
        payment.fraud_status = upsert.fraud_status.clone();
        payment.payment_data = Some(carry_remaining_payment(
            payment.payment_data.as_ref(),
            &upsert.payment_data,
        ));
        payment.updated_utc = now;

        let outcome = match transition {
            Some(t) => Some(state.apply_transition(upsert.order_id, t)?),
            None => None,
        };

        let payment = state
            .payments
            .get(&upsert.order_id)
            .cloned()
            .ok_or_else(|| AppError::InternalError(anyhow::anyhow!("payment row vanished")))?;

        Ok((payment, outcome))
    }
}
