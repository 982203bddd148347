//! Midtrans Snap client.
//!
//! Creates Snap transactions for the advance leg of an order. The customer
//! is redirected to the returned URL to pay.

use super::{AdvanceCharge, ChargeSession, GatewayError, PaymentGateway, ADVANCE_PAYMENT_MARKER};
use crate::config::MidtransConfig;
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Midtrans client for the Snap API.
#[derive(Clone)]
pub struct MidtransClient {
    client: Client,
    config: MidtransConfig,
}

/// Body of `POST /snap/v1/transactions`.
#[derive(Debug, Serialize)]
pub struct SnapTransactionRequest {
    pub transaction_details: TransactionDetails,
    pub customer_details: CustomerDetails,
    pub item_details: Vec<ItemDetails>,
    pub custom_field1: String,
    pub custom_field2: String,
}

#[derive(Debug, Serialize)]
pub struct TransactionDetails {
    pub order_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub gross_amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct CustomerDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ItemDetails {
    pub id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub quantity: u32,
    pub name: String,
}

/// Successful Snap response.
#[derive(Debug, Deserialize)]
pub struct SnapTransactionResponse {
    pub token: String,
    pub redirect_url: String,
}

/// Snap error response.
#[derive(Debug, Deserialize)]
pub struct SnapErrorResponse {
    #[serde(default)]
    pub error_messages: Vec<String>,
}

impl MidtransClient {
    pub fn new(config: MidtransConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, config }
    }

    /// Build the Snap request for an advance charge.
    pub fn build_request(charge: &AdvanceCharge) -> SnapTransactionRequest {
        let order_id = charge.order_id.to_string();
        SnapTransactionRequest {
            transaction_details: TransactionDetails {
                order_id: order_id.clone(),
                gross_amount: charge.advance_amount,
            },
            customer_details: CustomerDetails {
                first_name: charge.payer.name.clone(),
                email: charge.payer.email.clone(),
            },
            item_details: vec![ItemDetails {
                id: format!("advance_payment_{}", order_id),
                price: charge.advance_amount,
                quantity: 1,
                name: charge.description.clone(),
            }],
            custom_field1: ADVANCE_PAYMENT_MARKER.to_string(),
            custom_field2: format!("remaining_amount:{}", charge.remaining_amount),
        }
    }
}

#[async_trait]
impl PaymentGateway for MidtransClient {
    async fn create_advance_charge(
        &self,
        charge: &AdvanceCharge,
    ) -> Result<ChargeSession, GatewayError> {
        if !self.is_configured() {
            return Err(GatewayError::NotConfigured(
                "Midtrans server key not configured".to_string(),
            ));
        }

        let request = Self::build_request(charge);
        let url = format!("{}/snap/v1/transactions", self.config.snap_base_url);

        let response = self
            .client
            .post(&url)
            .basic_auth(self.config.server_key.expose_secret(), Some(""))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        tracing::debug!(status = %status, order_id = %charge.order_id, "Midtrans create transaction response");

        if status.is_success() {
            let session: SnapTransactionResponse = serde_json::from_str(&body)
                .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
            tracing::info!(
                order_id = %charge.order_id,
                gross_amount = %charge.advance_amount,
                "Midtrans advance charge created"
            );
            Ok(ChargeSession {
                token: session.token,
                redirect_url: session.redirect_url,
            })
        } else {
            let message = serde_json::from_str::<SnapErrorResponse>(&body)
                .ok()
                .filter(|e| !e.error_messages.is_empty())
                .map(|e| e.error_messages.join("; "))
                .unwrap_or(body);
            tracing::error!(
                status = %status,
                order_id = %charge.order_id,
                message = %message,
                "Midtrans transaction creation failed"
            );
            Err(GatewayError::Rejected {
                status: status.as_u16(),
                message,
            })
        }
    }

    fn is_configured(&self) -> bool {
        !self.config.server_key.expose_secret().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::gateway::Payer;
    use secrecy::Secret;
    use uuid::Uuid;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: &str) -> MidtransConfig {
        MidtransConfig {
            server_key: Secret::new("SB-Mid-server-test".to_string()),
            client_key: "SB-Mid-client-test".to_string(),
            is_production: false,
            snap_base_url: base_url.to_string(),
            timeout_secs: 5,
        }
    }

    fn charge() -> AdvanceCharge {
        AdvanceCharge {
            order_id: Uuid::new_v4(),
            advance_amount: Decimal::new(30000, 0),
            remaining_amount: Decimal::new(30000, 0),
            payer: Payer {
                name: Some("Budi".to_string()),
                email: Some("budi@example.com".to_string()),
            },
            description: "Advance Payment (50%) for Order".to_string(),
        }
    }

    #[test]
    fn request_marks_advance_payment() {
        let charge = charge();
        let request = MidtransClient::build_request(&charge);
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["transaction_details"]["order_id"], charge.order_id.to_string());
        assert_eq!(body["transaction_details"]["gross_amount"], 30000.0);
        assert_eq!(body["custom_field1"], "advance_payment");
        assert_eq!(body["custom_field2"], "remaining_amount:30000");
        assert_eq!(body["item_details"][0]["quantity"], 1);
        assert_eq!(
            body["item_details"][0]["id"],
            format!("advance_payment_{}", charge.order_id)
        );
    }

    #[test]
    fn empty_server_key_is_not_configured() {
        let mut config = test_config("http://localhost");
        config.server_key = Secret::new(String::new());
        assert!(!MidtransClient::new(config).is_configured());
    }

    #[tokio::test]
    async fn returns_redirect_url_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/snap/v1/transactions"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "token": "snap-token-1",
                "redirect_url": "https://app.sandbox.midtrans.com/snap/v2/vtweb/snap-token-1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = MidtransClient::new(test_config(&server.uri()));
        let session = client.create_advance_charge(&charge()).await.unwrap();

        assert_eq!(session.token, "snap-token-1");
        assert!(session.redirect_url.ends_with("snap-token-1"));
    }

    #[tokio::test]
    async fn surfaces_gateway_error_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/snap/v1/transactions"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error_messages": ["transaction_details.gross_amount is not equal to the sum of item_details"]
            })))
            .mount(&server)
            .await;

        let client = MidtransClient::new(test_config(&server.uri()));
        let err = client.create_advance_charge(&charge()).await.unwrap_err();

        match err {
            GatewayError::Rejected { status, message } => {
                assert_eq!(status, 400);
                assert!(message.contains("gross_amount"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
