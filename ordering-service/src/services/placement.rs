//! Order placement: stock check, atomic order creation with reservation,
//! then an advance charge request to the payment gateway.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::instrument;

use super::gateway::{AdvanceCharge, Payer, PaymentGateway};
use super::inventory::{self, InventoryLedger, MAX_LINE_QUANTITY};
use super::metrics;
use super::pricing;
use super::store::Store;
use crate::error::OrderingError;
use crate::models::{NewOrder, NewOrderItem, Order};

/// One requested line: menu item, quantity and the unit price the client saw.
#[derive(Debug, Clone)]
pub struct PlacementLine {
    pub menu_id: i64,
    pub quantity: i32,
    pub price: Decimal,
}

#[derive(Debug, Clone)]
pub struct PlacementRequest {
    pub user_id: i64,
    pub table_id: i64,
    /// Client-declared advance (50%) amount.
    pub advance_amount: Decimal,
    pub reservation_time: DateTime<Utc>,
    pub lines: Vec<PlacementLine>,
    pub payer: Payer,
}

/// Result of a successful placement.
#[derive(Debug, Clone)]
pub struct PlacementReceipt {
    pub order: Order,
    pub snap_token: String,
    pub snap_url: String,
}

#[derive(Clone)]
pub struct OrderPlacement {
    store: Arc<dyn Store>,
    inventory: InventoryLedger,
    gateway: Arc<dyn PaymentGateway>,
}

impl OrderPlacement {
    pub fn new(store: Arc<dyn Store>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            inventory: InventoryLedger::new(store.clone()),
            store,
            gateway,
        }
    }

    #[instrument(skip(self, request), fields(user_id = %request.user_id, table_id = %request.table_id))]
    pub async fn place(&self, request: PlacementRequest) -> Result<PlacementReceipt, OrderingError> {
        let result = self.place_inner(request).await;
        let outcome = match &result {
            Ok(_) => "created",
            Err(e) => e.kind(),
        };
        metrics::record_placement(outcome);
        result
    }

    async fn place_inner(&self, request: PlacementRequest) -> Result<PlacementReceipt, OrderingError> {
        validate(&request)?;

        if self.store.get_table(request.table_id).await?.is_none() {
            return Err(OrderingError::validation("table_id", "exists"));
        }

        // Same menu item on several lines is checked as one quantity.
        let requested = inventory::requested_quantities(
            request.lines.iter().map(|l| (l.menu_id, l.quantity)),
        )?;
        for (&menu_id, &quantity) in &requested {
            let item = self.inventory.check_available(menu_id, quantity).await?;
            for line in request.lines.iter().filter(|l| l.menu_id == menu_id) {
                if line.price != item.price {
                    tracing::warn!(
                        menu_id = menu_id,
                        submitted_price = %line.price,
                        menu_price = %item.price,
                        "Submitted unit price differs from menu price"
                    );
                }
            }
        }

        let total = pricing::total_from_advance(request.advance_amount)?;
        if !pricing::is_storable_amount(total) {
            return Err(OrderingError::validation("amount", "max"));
        }

        let order = self
            .store
            .create_order(&NewOrder {
                user_id: request.user_id,
                table_id: request.table_id,
                amount: total,
                reservation_time: request.reservation_time,
                items: request
                    .lines
                    .iter()
                    .map(|l| NewOrderItem {
                        menu_id: l.menu_id,
                        quantity: l.quantity,
                        price: l.price,
                    })
                    .collect(),
            })
            .await?;

        tracing::info!(
            order_id = %order.id,
            amount = %order.amount,
            advance_amount = %order.advance_amount(),
            "Order placed, requesting advance charge"
        );

        let charge = AdvanceCharge {
            order_id: order.id,
            advance_amount: order.advance_amount(),
            remaining_amount: order.remaining_amount(),
            payer: request.payer,
            description: format!("Advance Payment (50%) for Order #{}", order.id),
        };

        // The order stays pending with its stock reserved if this fails; it
        // can still be paid or cancelled later.
        let session = self
            .gateway
            .create_advance_charge(&charge)
            .await
            .map_err(|e| {
                tracing::error!(
                    order_id = %order.id,
                    error = %e,
                    "Advance charge request failed; order left pending with stock reserved"
                );
                OrderingError::Gateway(e)
            })?;

        Ok(PlacementReceipt {
            order,
            snap_token: session.token,
            snap_url: session.redirect_url,
        })
    }
}

fn validate(request: &PlacementRequest) -> Result<(), OrderingError> {
    if request.lines.is_empty() {
        return Err(OrderingError::validation("order_items", "required"));
    }
    if request.advance_amount < Decimal::ZERO {
        return Err(OrderingError::validation("amount", "min"));
    }
    if !pricing::is_storable_amount(request.advance_amount) {
        return Err(OrderingError::validation("amount", "max"));
    }
    for line in &request.lines {
        if line.quantity < 1 {
            return Err(OrderingError::validation("order_items.quantity", "min"));
        }
        if line.quantity > MAX_LINE_QUANTITY {
            return Err(OrderingError::validation("order_items.quantity", "max"));
        }
        if line.price < Decimal::ZERO {
            return Err(OrderingError::validation("order_items.price", "min"));
        }
        if !pricing::is_storable_amount(line.price) {
            return Err(OrderingError::validation("order_items.price", "max"));
        }
    }
    Ok(())
}
