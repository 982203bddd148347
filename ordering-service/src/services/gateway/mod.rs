//! Payment gateway boundary.
//!
//! Outbound: request an advance charge and receive a redirect handle.
//! Inbound: notifications, which arrive already authenticated by the
//! transport in front of this service.

pub mod midtrans;
pub mod mock;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use midtrans::MidtransClient;
pub use mock::MockGateway;

/// Marker sent with every charge created at placement.
pub const ADVANCE_PAYMENT_MARKER: &str = "advance_payment";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Gateway not configured: {0}")]
    NotConfigured(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Gateway rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid gateway response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Connection(err.to_string())
    }
}

/// Who is paying, as shown on the gateway's checkout page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Payer {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Request to charge the advance portion of an order.
#[derive(Debug, Clone)]
pub struct AdvanceCharge {
    pub order_id: Uuid,
    pub advance_amount: Decimal,
    pub remaining_amount: Decimal,
    pub payer: Payer,
    pub description: String,
}

/// Handle the client uses to complete checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeSession {
    pub token: String,
    pub redirect_url: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_advance_charge(
        &self,
        charge: &AdvanceCharge,
    ) -> Result<ChargeSession, GatewayError>;

    fn is_configured(&self) -> bool;
}

/// Inbound gateway notification.
///
/// Named fields are the ones reconciliation relies on; everything else the
/// gateway sends is kept in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayNotification {
    pub order_id: String,
    pub transaction_id: String,
    pub transaction_status: String,
    #[serde(default)]
    pub fraud_status: Option<String>,
    #[serde(default)]
    pub payment_type: Option<String>,
    pub gross_amount: Decimal,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl GatewayNotification {
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(payload.clone())
    }
}
