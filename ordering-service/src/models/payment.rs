//! Payment record kept alongside each order.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Local payment status.
///
/// `Completed` is set when the online advance leg settles; the remaining
/// leg is recorded separately when staff complete the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Gateway transaction state for an order. At most one row per order.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub order_id: Uuid,
    pub transaction_id: String,
    pub payment_type: Option<String>,
    pub payment_method: Option<String>,
    pub amount: Decimal,
    pub gross_amount: Decimal,
    pub remaining_amount: Decimal,
    pub transaction_status: String,
    pub fraud_status: Option<String>,
    pub payment_data: Option<serde_json::Value>,
    pub status: PaymentStatus,
    pub remaining_payment_method: Option<String>,
    pub remaining_paid_by: Option<i64>,
    pub remaining_paid_at: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Payment {
    /// Both legs are settled.
    pub fn is_fully_paid(&self) -> bool {
        self.status == PaymentStatus::Completed && self.remaining_paid_at.is_some()
    }
}

/// Fields written by every gateway notification (last write wins).
#[derive(Debug, Clone)]
pub struct PaymentUpsert {
    pub order_id: Uuid,
    pub transaction_id: String,
    pub payment_type: Option<String>,
    pub amount: Decimal,
    pub gross_amount: Decimal,
    pub remaining_amount: Decimal,
    pub transaction_status: String,
    pub fraud_status: Option<String>,
    pub payment_data: serde_json::Value,
}

/// Remaining leg settled at the restaurant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemainingPayment {
    pub amount: Decimal,
    pub method: String,
    pub staff_id: Option<i64>,
    pub completed_at: DateTime<Utc>,
}

impl RemainingPayment {
    /// `payment_data` with this payment merged under `remaining_payment`.
    pub fn merge_into(&self, payment_data: Option<&serde_json::Value>) -> serde_json::Value {
        let mut data = match payment_data {
            Some(serde_json::Value::Object(map)) => map.clone(),
            _ => serde_json::Map::new(),
        };
        data.insert(
            REMAINING_PAYMENT_KEY.to_string(),
            serde_json::json!({
                "amount": self.amount,
                "method": self.method,
                "staff_id": self.staff_id,
                "completed_at": self.completed_at,
            }),
        );
        serde_json::Value::Object(data)
    }
}

/// Key under which the remaining leg is recorded in `payment_data`.
pub const REMAINING_PAYMENT_KEY: &str = "remaining_payment";

/// Gateway payload to store on upsert, keeping any remaining-payment entry
/// already recorded on the row.
pub fn carry_remaining_payment(
    previous: Option<&serde_json::Value>,
    incoming: &serde_json::Value,
) -> serde_json::Value {
    let recorded = previous
        .and_then(|data| data.get(REMAINING_PAYMENT_KEY))
        .filter(|entry| !entry.is_null());

    match (recorded, incoming) {
        (Some(entry), serde_json::Value::Object(map)) => {
            let mut data = map.clone();
            data.insert(REMAINING_PAYMENT_KEY.to_string(), entry.clone());
            serde_json::Value::Object(data)
        }
        _ => incoming.clone(),
    }
}
