//! Payment reconciliation engine.
//!
//! Maps gateway notifications onto the order lifecycle and runs the staff
//! actions that move an order past the advance payment. Every status change
//! goes through a guarded [`Transition`], so a replayed or racing request
//! never applies stock or table side effects twice.

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use super::gateway::GatewayNotification;
use super::metrics;
use super::store::{StockLine, Store, Transition, TransitionOutcome};
use crate::error::OrderingError;
use crate::models::{
    Order, OrderStatus, Payment, PaymentStatus, PaymentUpsert, RemainingPayment, TableStatus,
};

/// Order status implied by a gateway transaction state.
///
/// A settled or accepted capture pays the advance leg only, so it maps to
/// `AdvancePaid` rather than a fully paid order.
pub fn map_transaction_status(transaction_status: &str, fraud_status: Option<&str>) -> OrderStatus {
    match transaction_status {
        "capture" if fraud_status == Some("challenge") => OrderStatus::Pending,
        "capture" | "settlement" => OrderStatus::AdvancePaid,
        "pending" => OrderStatus::Pending,
        "deny" | "cancel" | "expire" => OrderStatus::Cancelled,
        "failure" => OrderStatus::Failed,
        _ => OrderStatus::Pending,
    }
}

/// Transition a notification asks for, given the order's stored status.
///
/// Only a `pending` order reacts to notifications. Anything else is either a
/// replay (already in the target status) or stale.
pub fn notification_transition(current: OrderStatus, target: OrderStatus) -> Option<Transition> {
    if current != OrderStatus::Pending || !current.can_transition_to(target) {
        return None;
    }
    match target {
        OrderStatus::AdvancePaid => Some(
            Transition::new(current, target)
                .with_table(TableStatus::Reserved)
                .with_payment_status(PaymentStatus::Completed),
        ),
        OrderStatus::Cancelled => Some(
            Transition::new(current, target)
                .releasing_stock()
                .with_table(TableStatus::Available)
                .with_payment_status(PaymentStatus::Cancelled),
        ),
        OrderStatus::Failed => Some(
            Transition::new(current, target)
                .releasing_stock()
                .with_table(TableStatus::Available)
                .with_payment_status(PaymentStatus::Failed),
        ),
        _ => None,
    }
}

/// What a notification did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationEffect {
    /// The order moved to the mapped status.
    Applied,
    /// The order was already in the mapped status.
    Replayed,
    /// The mapped status is not reachable from the order's status.
    Ignored,
}

impl NotificationEffect {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationEffect::Applied => "applied",
            NotificationEffect::Replayed => "replayed",
            NotificationEffect::Ignored => "ignored",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NotificationResult {
    pub order_id: Uuid,
    pub mapped_status: OrderStatus,
    pub order_status: OrderStatus,
    pub effect: NotificationEffect,
    pub payment: Payment,
}

#[derive(Debug, Clone)]
pub struct ArrivalConfirmation {
    pub order: Order,
    pub remaining_amount_due: Decimal,
}

#[derive(Debug, Clone)]
pub struct RemainingSettlement {
    pub order: Order,
    pub payment: Option<Payment>,
    pub total_paid: Decimal,
    pub advance_paid: Decimal,
    pub remaining_paid: Decimal,
}

#[derive(Debug, Clone)]
pub struct PaymentStatusView {
    pub order_id: Uuid,
    pub order_status: OrderStatus,
    pub payment: Option<Payment>,
}

#[derive(Clone)]
pub struct ReconciliationEngine {
    store: Arc<dyn Store>,
}

impl ReconciliationEngine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Reconcile one gateway notification.
    ///
    /// The payload is trusted; authenticity is checked before it gets here.
    pub async fn handle_notification(
        &self,
        payload: &serde_json::Value,
    ) -> Result<NotificationResult, OrderingError> {
        let notification = GatewayNotification::from_payload(payload).map_err(|e| {
            tracing::warn!(error = %e, "Malformed payment notification");
            OrderingError::validation("notification", "malformed")
        })?;

        tracing::info!(
            order_id = %notification.order_id,
            transaction_id = %notification.transaction_id,
            transaction_status = %notification.transaction_status,
            fraud_status = ?notification.fraud_status,
            payment_type = ?notification.payment_type,
            gross_amount = %notification.gross_amount,
            "Payment notification received"
        );

        let mapped = map_transaction_status(
            &notification.transaction_status,
            notification.fraud_status.as_deref(),
        );

        let result = self.reconcile(&notification, payload, mapped).await;

        match &result {
            Ok(r) => metrics::record_notification(mapped.as_str(), r.effect.as_str()),
            Err(e) => {
                metrics::record_notification(mapped.as_str(), e.kind());
                if let OrderingError::Infrastructure(cause) = e {
                    tracing::error!(
                        order_id = %notification.order_id,
                        transaction_status = %notification.transaction_status,
                        fraud_status = ?notification.fraud_status,
                        error = %cause,
                        "Payment notification processing failed"
                    );
                }
            }
        }

        result
    }

    #[instrument(skip(self, notification, payload), fields(order_id = %notification.order_id, mapped_status = %mapped))]
    async fn reconcile(
        &self,
        notification: &GatewayNotification,
        payload: &serde_json::Value,
        mapped: OrderStatus,
    ) -> Result<NotificationResult, OrderingError> {
        let order_id = Uuid::parse_str(&notification.order_id)
            .map_err(|_| OrderingError::OrderNotFound(notification.order_id.clone()))?;
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or_else(|| OrderingError::order_not_found(order_id))?;

        let transition = notification_transition(order.status, mapped);

        let upsert = PaymentUpsert {
            order_id,
            transaction_id: notification.transaction_id.clone(),
            payment_type: notification.payment_type.clone(),
            amount: order.amount,
            gross_amount: notification.gross_amount,
            remaining_amount: order.amount - notification.gross_amount,
            transaction_status: notification.transaction_status.clone(),
            fraud_status: notification.fraud_status.clone(),
            payment_data: payload.clone(),
        };

        let (payment, outcome) = self
            .store
            .reconcile_payment(&upsert, transition.as_ref())
            .await?;

        let (effect, order_status) = match outcome {
            Some(TransitionOutcome::Applied { order, lines }) => {
                log_applied(&order, &lines);
                (NotificationEffect::Applied, order.status)
            }
            Some(TransitionOutcome::Stale { current }) => {
                tracing::warn!(
                    order_id = %order_id,
                    current_status = %current,
                    mapped_status = %mapped,
                    "Order changed concurrently; notification transition skipped"
                );
                (NotificationEffect::Ignored, current)
            }
            None if order.status == mapped => {
                tracing::debug!(order_id = %order_id, status = %mapped, "Notification replay, no state change");
                (NotificationEffect::Replayed, order.status)
            }
            None => {
                tracing::warn!(
                    order_id = %order_id,
                    current_status = %order.status,
                    mapped_status = %mapped,
                    "Stale notification ignored"
                );
                (NotificationEffect::Ignored, order.status)
            }
        };

        Ok(NotificationResult {
            order_id,
            mapped_status: mapped,
            order_status,
            effect,
            payment,
        })
    }

    /// Cancel a pending order, returning its stock and freeing the table.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn cancel_order(&self, order_id: Uuid) -> Result<Order, OrderingError> {
        let result = self.cancel_order_inner(order_id).await;
        record_action("cancel", &result);
        result
    }

    async fn cancel_order_inner(&self, order_id: Uuid) -> Result<Order, OrderingError> {
        let transition = Transition::new(OrderStatus::Pending, OrderStatus::Cancelled)
            .releasing_stock()
            .with_table(TableStatus::Available)
            .with_payment_status(PaymentStatus::Cancelled);

        let order = self.load_order(order_id).await?;
        require(order.status, &transition)?;

        let (order, lines) = self.apply(order_id, &transition).await?;
        log_applied(&order, &lines);
        Ok(order)
    }

    /// Staff confirm the customer has arrived for an advance-paid order.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn confirm_arrival(
        &self,
        order_id: Uuid,
        staff_id: Option<i64>,
    ) -> Result<ArrivalConfirmation, OrderingError> {
        let result = self.confirm_arrival_inner(order_id, staff_id).await;
        record_action("confirm_arrival", &result);
        result
    }

    async fn confirm_arrival_inner(
        &self,
        order_id: Uuid,
        staff_id: Option<i64>,
    ) -> Result<ArrivalConfirmation, OrderingError> {
        let transition = Transition::new(OrderStatus::AdvancePaid, OrderStatus::Confirmed)
            .with_table(TableStatus::Occupied);

        let order = self.load_order(order_id).await?;
        require(order.status, &transition)?;

        let (order, _) = self.apply(order_id, &transition).await?;

        tracing::info!(order_id = %order.id, staff_id = ?staff_id, "Customer arrival confirmed");

        Ok(ArrivalConfirmation {
            remaining_amount_due: order.remaining_amount(),
            order,
        })
    }

    /// Record the remaining 50% paid at the restaurant and complete the order.
    ///
    /// Only an `advance_paid` order can be completed this way.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn complete_remaining_payment(
        &self,
        order_id: Uuid,
        method: &str,
        staff_id: Option<i64>,
    ) -> Result<RemainingSettlement, OrderingError> {
        let result = self
            .complete_remaining_payment_inner(order_id, method, staff_id)
            .await;
        record_action("complete_remaining", &result);
        result
    }

    async fn complete_remaining_payment_inner(
        &self,
        order_id: Uuid,
        method: &str,
        staff_id: Option<i64>,
    ) -> Result<RemainingSettlement, OrderingError> {
        if method.trim().is_empty() {
            return Err(OrderingError::validation("payment_method", "required"));
        }

        let order = self.load_order(order_id).await?;

        let remaining = RemainingPayment {
            amount: order.remaining_amount(),
            method: method.to_string(),
            staff_id,
            completed_at: Utc::now(),
        };
        let transition = Transition::new(OrderStatus::AdvancePaid, OrderStatus::Completed)
            .with_table(TableStatus::InUse)
            .with_payment_status(PaymentStatus::Completed)
            .with_remaining_payment(remaining.clone());
        require(order.status, &transition)?;

        let (order, _) = self.apply(order_id, &transition).await?;
        let payment = self.store.get_payment(order_id).await?;

        tracing::info!(
            order_id = %order.id,
            remaining_amount = %remaining.amount,
            payment_method = %remaining.method,
            staff_id = ?staff_id,
            "Remaining payment completed at restaurant"
        );

        Ok(RemainingSettlement {
            total_paid: order.amount,
            advance_paid: order.advance_amount(),
            remaining_paid: order.remaining_amount(),
            order,
            payment,
        })
    }

    /// Current order status and payment row, if any.
    pub async fn payment_status(&self, order_id: Uuid) -> Result<PaymentStatusView, OrderingError> {
        let order = self.load_order(order_id).await?;
        let payment = self.store.get_payment(order_id).await?;
        Ok(PaymentStatusView {
            order_id,
            order_status: order.status,
            payment,
        })
    }

    async fn load_order(&self, order_id: Uuid) -> Result<Order, OrderingError> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or_else(|| OrderingError::order_not_found(order_id))
    }

    async fn apply(
        &self,
        order_id: Uuid,
        transition: &Transition,
    ) -> Result<(Order, Vec<StockLine>), OrderingError> {
        match self.store.apply_transition(order_id, transition).await? {
            TransitionOutcome::Applied { order, lines } => Ok((order, lines)),
            TransitionOutcome::Stale { current } => {
                tracing::warn!(
                    order_id = %order_id,
                    current_status = %current,
                    expected_status = %transition.from,
                    "Order changed concurrently; transition rejected"
                );
                Err(OrderingError::InvalidTransition {
                    current,
                    required: transition.from,
                })
            }
        }
    }
}

/// Reject a manual action unless the order sits in the transition's source
/// status and the lifecycle allows the move.
fn require(current: OrderStatus, transition: &Transition) -> Result<(), OrderingError> {
    if current == transition.from && transition.from.can_transition_to(transition.to) {
        Ok(())
    } else {
        Err(OrderingError::InvalidTransition {
            current,
            required: transition.from,
        })
    }
}

fn record_action<T>(action: &str, result: &Result<T, OrderingError>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    };
    metrics::record_manual_action(action, outcome);
}

fn log_applied(order: &Order, lines: &[StockLine]) {
    match order.status {
        OrderStatus::AdvancePaid => {
            tracing::info!(order_id = %order.id, amount = %order.amount, "Advance payment confirmed");
            for line in lines {
                tracing::info!(
                    order_id = %order.id,
                    menu_id = line.menu_id,
                    menu_name = %line.menu_name,
                    quantity = line.quantity,
                    current_stock = line.stock,
                    "Reserved stock confirmed for paid order"
                );
            }
        }
        OrderStatus::Cancelled | OrderStatus::Failed => {
            let reason = order.status.as_str();
            for line in lines {
                metrics::record_stock_released(reason, line.quantity);
                tracing::info!(
                    order_id = %order.id,
                    menu_id = line.menu_id,
                    menu_name = %line.menu_name,
                    quantity = line.quantity,
                    restored_stock = line.stock,
                    reason = reason,
                    "Stock restored"
                );
            }
        }
        _ => {}
    }
}
