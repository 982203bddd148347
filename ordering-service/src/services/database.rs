//! PostgreSQL store for ordering-service.

use async_trait::async_trait;
use serde_json::json;
use service_core::error::AppError;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use super::inventory;
use super::store::{StockLine, Store, Transition, TransitionOutcome};
use crate::error::OrderingError;
use crate::models::{
    MenuItem, NewOrder, Order, OrderItem, OrderStatus, Payment, PaymentUpsert, RestaurantTable,
    StockScope,
};
use crate::services::metrics::DB_QUERY_DURATION;

const MENU_COLUMNS: &str =
    "id, restaurant_id, name, description, price, stock, category, created_utc, updated_utc";
const ORDER_COLUMNS: &str =
    "id, user_id, table_id, amount, status, reservation_time, created_utc, updated_utc";
const PAYMENT_COLUMNS: &str = "order_id, transaction_id, payment_type, payment_method, amount, \
     gross_amount, remaining_amount, transaction_status, fraud_status, payment_data, status, \
     remaining_payment_method, remaining_paid_by, remaining_paid_at, created_utc, updated_utc";

fn db_error(context: &str, e: sqlx::Error) -> AppError {
    AppError::DatabaseError(anyhow::anyhow!("{}: {}", context, e))
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "ordering-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| db_error("Failed to connect", e))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Decrement stock if at least `quantity` is on hand.
    async fn reserve_in(
        conn: &mut PgConnection,
        menu_id: i64,
        quantity: i32,
    ) -> Result<i32, OrderingError> {
        let reserved = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE menus SET stock = stock - $2, updated_utc = NOW()
            WHERE id = $1 AND stock >= $2
            RETURNING stock
            "#,
        )
        .bind(menu_id)
        .bind(quantity)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| OrderingError::database("Failed to reserve stock", e))?;

        if let Some(stock) = reserved {
            return Ok(stock);
        }

        let menu = sqlx::query_as::<_, (String, i32)>("SELECT name, stock FROM menus WHERE id = $1")
            .bind(menu_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| OrderingError::database("Failed to read stock", e))?;
        let (menu_name, available) =
            menu.ok_or_else(|| OrderingError::validation("menu_id", "exists"))?;

        Err(OrderingError::InsufficientStock {
            menu_id,
            menu_name,
            available,
            requested: quantity,
        })
    }

    /// Increment stock. No upper bound is enforced. Returns the item name and
    /// new stock, or `None` if the menu item no longer exists.
    async fn release_in(
        conn: &mut PgConnection,
        menu_id: i64,
        quantity: i32,
    ) -> Result<Option<(String, i32)>, AppError> {
        sqlx::query_as::<_, (String, i32)>(
            r#"
            UPDATE menus SET stock = stock + $2, updated_utc = NOW()
            WHERE id = $1
            RETURNING name, stock
            "#,
        )
        .bind(menu_id)
        .bind(quantity)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| db_error("Failed to release stock", e))
    }

    /// Guarded status update plus side effects on an open transaction.
    async fn transition_in(
        conn: &mut PgConnection,
        order_id: Uuid,
        transition: &Transition,
    ) -> Result<TransitionOutcome, AppError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            r#"
            UPDATE orders SET status = $3, updated_utc = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order_id)
        .bind(transition.from.as_str())
        .bind(transition.to.as_str())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| db_error("Failed to update order status", e))?;

        let order = match order {
            Some(order) => order,
            None => {
                let current = sqlx::query_scalar::<_, OrderStatus>(
                    "SELECT status FROM orders WHERE id = $1",
                )
                .bind(order_id)
                .fetch_optional(&mut *conn)
                .await
                .map_err(|e| db_error("Failed to read order status", e))?
                .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Order {} not found", order_id)))?;
                return Ok(TransitionOutcome::Stale { current });
            }
        };

        let rows = sqlx::query_as::<_, (i64, i32)>(
            "SELECT menu_id, quantity FROM order_items WHERE order_id = $1 ORDER BY menu_id, id",
        )
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| db_error("Failed to load order items", e))?;

        let mut lines = Vec::with_capacity(rows.len());
        for (menu_id, quantity) in rows {
            let menu = if transition.release_stock {
                Self::release_in(&mut *conn, menu_id, quantity).await?
            } else {
                sqlx::query_as::<_, (String, i32)>("SELECT name, stock FROM menus WHERE id = $1")
                    .bind(menu_id)
                    .fetch_optional(&mut *conn)
                    .await
                    .map_err(|e| db_error("Failed to read stock", e))?
            };

            if let Some((menu_name, stock)) = menu {
                lines.push(StockLine {
                    menu_id,
                    menu_name,
                    quantity,
                    stock,
                });
            }
        }

        if let Some(status) = transition.table_status {
            sqlx::query(
                "UPDATE restaurant_tables SET status = $2, updated_utc = NOW() WHERE id = $1",
            )
            .bind(order.table_id)
            .bind(status.as_str())
            .execute(&mut *conn)
            .await
            .map_err(|e| db_error("Failed to update table status", e))?;
        }

        if let Some(status) = transition.payment_status {
            sqlx::query("UPDATE payments SET status = $2, updated_utc = NOW() WHERE order_id = $1")
                .bind(order_id)
                .bind(status.as_str())
                .execute(&mut *conn)
                .await
                .map_err(|e| db_error("Failed to update payment status", e))?;
        }

        if let Some(remaining) = &transition.remaining_payment {
            let detail = json!({
                "amount": remaining.amount,
                "method": remaining.method,
                "staff_id": remaining.staff_id,
                "completed_at": remaining.completed_at,
            });
            sqlx::query(
                r#"
                UPDATE payments SET
                    remaining_payment_method = $2,
                    remaining_paid_by = $3,
                    remaining_paid_at = $4,
                    payment_data = COALESCE(payment_data, '{}'::jsonb)
                        || jsonb_build_object('remaining_payment', $5::jsonb),
                    updated_utc = NOW()
                WHERE order_id = $1
                "#,
            )
            .bind(order_id)
            .bind(&remaining.method)
            .bind(remaining.staff_id)
            .bind(remaining.completed_at)
            .bind(detail)
            .execute(&mut *conn)
            .await
            .map_err(|e| db_error("Failed to record remaining payment", e))?;
        }

        Ok(TransitionOutcome::Applied { order, lines })
    }
}

#[async_trait]
impl Store for PgStore {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Health check failed", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(menu_id = %menu_id))]
    async fn get_menu_item(&self, menu_id: i64) -> Result<Option<MenuItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_menu_item"])
            .start_timer();

        let item = sqlx::query_as::<_, MenuItem>(&format!(
            "SELECT {MENU_COLUMNS} FROM menus WHERE id = $1"
        ))
        .bind(menu_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get menu item", e))?;

        timer.observe_duration();
        Ok(item)
    }

    #[instrument(skip(self))]
    async fn list_menu_items(
        &self,
        restaurant_id: Option<i64>,
        scope: Option<StockScope>,
    ) -> Result<Vec<MenuItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_menu_items"])
            .start_timer();

        let items = sqlx::query_as::<_, MenuItem>(&format!(
            r#"
            SELECT {MENU_COLUMNS}
            FROM menus
            WHERE ($1::bigint IS NULL OR restaurant_id = $1)
              AND ($2::varchar IS NULL
                   OR ($2 = 'available' AND stock > 0)
                   OR ($2 = 'out_of_stock' AND stock <= 0))
            ORDER BY id
            "#
        ))
        .bind(restaurant_id)
        .bind(scope.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list menu items", e))?;

        timer.observe_duration();
        Ok(items)
    }

    #[instrument(skip(self), fields(table_id = %table_id))]
    async fn get_table(&self, table_id: i64) -> Result<Option<RestaurantTable>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_table"])
            .start_timer();

        let table = sqlx::query_as::<_, RestaurantTable>(
            r#"
            SELECT id, restaurant_id, capacity, status, created_utc, updated_utc
            FROM restaurant_tables
            WHERE id = $1
            "#,
        )
        .bind(table_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get table", e))?;

        timer.observe_duration();
        Ok(table)
    }

    #[instrument(skip(self, new_order), fields(user_id = %new_order.user_id, table_id = %new_order.table_id))]
    async fn create_order(&self, new_order: &NewOrder) -> Result<Order, OrderingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_order"])
            .start_timer();

        let requested = inventory::requested_quantities(
            new_order.items.iter().map(|i| (i.menu_id, i.quantity)),
        )?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| OrderingError::database("Failed to begin transaction", e))?;

        let order = sqlx::query_as::<_, Order>(&format!(
            r#"
            INSERT INTO orders (id, user_id, table_id, amount, status, reservation_time)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(new_order.user_id)
        .bind(new_order.table_id)
        .bind(new_order.amount)
        .bind(OrderStatus::Pending.as_str())
        .bind(new_order.reservation_time)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| OrderingError::database("Failed to insert order", e))?;

        for item in &new_order.items {
            sqlx::query(
                "INSERT INTO order_items (order_id, menu_id, quantity, price) VALUES ($1, $2, $3, $4)",
            )
            .bind(order.id)
            .bind(item.menu_id)
            .bind(item.quantity)
            .bind(item.price)
            .execute(&mut *tx)
            .await
            .map_err(|e| OrderingError::database("Failed to insert order item", e))?;
        }

        // Reserve in menu id order so concurrent placements lock rows
        // consistently.
        for (menu_id, quantity) in requested {
            if let Err(e) = Self::reserve_in(&mut tx, menu_id, quantity).await {
                tx.rollback().await.ok();
                return Err(e);
            }
        }

        tx.commit()
            .await
            .map_err(|e| OrderingError::database("Failed to commit transaction", e))?;

        timer.observe_duration();

        info!(
            order_id = %order.id,
            amount = %order.amount,
            items = new_order.items.len(),
            "Order created with stock reserved"
        );

        Ok(order)
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_order"])
            .start_timer();

        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get order", e))?;

        timer.observe_duration();
        Ok(order)
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    async fn list_order_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_order_items"])
            .start_timer();

        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT id, order_id, menu_id, quantity, price, created_utc
            FROM order_items
            WHERE order_id = $1
            ORDER BY id
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list order items", e))?;

        timer.observe_duration();
        Ok(items)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn list_orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_orders_for_user"])
            .start_timer();

        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_utc DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list orders", e))?;

        timer.observe_duration();
        Ok(orders)
    }

    #[instrument(skip(self, transition), fields(order_id = %order_id, from = %transition.from, to = %transition.to))]
    async fn apply_transition(
        &self,
        order_id: Uuid,
        transition: &Transition,
    ) -> Result<TransitionOutcome, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["apply_transition"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", e))?;

        let outcome = Self::transition_in(&mut tx, order_id, transition).await?;

        if outcome.is_applied() {
            tx.commit()
                .await
                .map_err(|e| db_error("Failed to commit transaction", e))?;
        } else {
            tx.rollback().await.ok();
        }

        timer.observe_duration();
        Ok(outcome)
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    async fn get_payment(&self, order_id: Uuid) -> Result<Option<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_payment"])
            .start_timer();

        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get payment", e))?;

        timer.observe_duration();
        Ok(payment)
    }

    #[instrument(skip(self, upsert, transition), fields(order_id = %upsert.order_id, transaction_status = %upsert.transaction_status))]
    async fn reconcile_payment(
        &self,
        upsert: &PaymentUpsert,
        transition: Option<&Transition>,
    ) -> Result<(Payment, Option<TransitionOutcome>), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["reconcile_payment"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO payments (
                order_id, transaction_id, payment_type, payment_method, amount, gross_amount,
                remaining_amount, transaction_status, fraud_status, payment_data, status
            )
            VALUES ($1, $2, $3, $3, $4, $5, $6, $7, $8, $9, 'pending')
            ON CONFLICT (order_id) DO UPDATE SET
                transaction_id = EXCLUDED.transaction_id,
                payment_type = EXCLUDED.payment_type,
                payment_method = EXCLUDED.payment_method,
                amount = EXCLUDED.amount,
                gross_amount = EXCLUDED.gross_amount,
                remaining_amount = EXCLUDED.remaining_amount,
                transaction_status = EXCLUDED.transaction_status,
                fraud_status = EXCLUDED.fraud_status,
                payment_data = CASE
                    WHEN jsonb_typeof(payments.payment_data -> 'remaining_payment') IS NOT NULL
                     AND jsonb_typeof(payments.payment_data -> 'remaining_payment') <> 'null'
                     AND jsonb_typeof(EXCLUDED.payment_data) = 'object'
                    THEN EXCLUDED.payment_data || jsonb_build_object(
                        'remaining_payment', payments.payment_data -> 'remaining_payment'
                    )
                    ELSE EXCLUDED.payment_data
                END,
                updated_utc = NOW()
            "#,
        )
        .bind(upsert.order_id)
        .bind(&upsert.transaction_id)
        .bind(&upsert.payment_type)
        .bind(upsert.amount)
        .bind(upsert.gross_amount)
        .bind(upsert.remaining_amount)
        .bind(&upsert.transaction_status)
        .bind(&upsert.fraud_status)
        .bind(&upsert.payment_data)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to upsert payment", e))?;

        let outcome = match transition {
            Some(t) => Some(Self::transition_in(&mut tx, upsert.order_id, t).await?),
            None => None,
        };

        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1"
        ))
        .bind(upsert.order_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to read payment", e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit transaction", e))?;

        timer.observe_duration();
        Ok((payment, outcome))
    }
}
