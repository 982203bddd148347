//! Domain errors for ordering-service.
//!
//! Business-rule rejections carry the data a caller needs to react; anything
//! unexpected collapses into `Infrastructure` and is reported as a generic 500.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use service_core::error::AppError;
use thiserror::Error;
use uuid::Uuid;

use crate::models::OrderStatus;
use crate::services::gateway::GatewayError;

#[derive(Debug, Error)]
pub enum OrderingError {
    #[error("Insufficient stock for menu item {menu_name} ({menu_id}): available {available}, requested {requested}")]
    InsufficientStock {
        menu_id: i64,
        menu_name: String,
        available: i32,
        requested: i32,
    },

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Invalid transition: order is {current}, requires {required}")]
    InvalidTransition {
        current: OrderStatus,
        required: OrderStatus,
    },

    #[error("Validation failed for {field}: {rule}")]
    Validation { field: String, rule: String },

    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Infrastructure(#[from] AppError),
}

impl OrderingError {
    pub fn validation(field: impl Into<String>, rule: impl Into<String>) -> Self {
        OrderingError::Validation {
            field: field.into(),
            rule: rule.into(),
        }
    }

    pub fn order_not_found(order_id: Uuid) -> Self {
        OrderingError::OrderNotFound(order_id.to_string())
    }

    pub fn database(context: &str, err: impl std::fmt::Display) -> Self {
        OrderingError::Infrastructure(AppError::DatabaseError(anyhow::anyhow!(
            "{}: {}",
            context,
            err
        )))
    }

    /// Business-rule rejections that a webhook should still acknowledge.
    pub fn is_business_rejection(&self) -> bool {
        matches!(
            self,
            OrderingError::InsufficientStock { .. }
                | OrderingError::InvalidTransition { .. }
                | OrderingError::Validation { .. }
        )
    }

    /// Label used for the error counter.
    pub fn kind(&self) -> &'static str {
        match self {
            OrderingError::InsufficientStock { .. } => "insufficient_stock",
            OrderingError::OrderNotFound(_) => "order_not_found",
            OrderingError::InvalidTransition { .. } => "invalid_transition",
            OrderingError::Validation { .. } => "validation",
            OrderingError::Gateway(_) => "gateway",
            OrderingError::Infrastructure(_) => "internal",
        }
    }
}

impl From<validator::ValidationErrors> for OrderingError {
    fn from(errors: validator::ValidationErrors) -> Self {
        // Report the first offending field; nested list errors are flattened
        // to their parent field name.
        let (field, rule) = errors
            .errors()
            .iter()
            .next()
            .map(|(field, kind)| {
                let rule = match kind {
                    validator::ValidationErrorsKind::Field(errs) => errs
                        .first()
                        .map(|e| e.code.to_string())
                        .unwrap_or_else(|| "invalid".to_string()),
                    validator::ValidationErrorsKind::List(_) => "invalid_item".to_string(),
                    validator::ValidationErrorsKind::Struct(_) => "invalid".to_string(),
                };
                (field.to_string(), rule)
            })
            .unwrap_or_else(|| ("request".to_string(), "invalid".to_string()));

        OrderingError::Validation { field, rule }
    }
}

impl IntoResponse for OrderingError {
    fn into_response(self) -> Response {
        match self {
            OrderingError::InsufficientStock {
                menu_id,
                ref menu_name,
                available,
                requested,
            } => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": format!("Insufficient stock for menu item: {}", menu_name),
                    "menu_id": menu_id,
                    "available_stock": available,
                    "requested_quantity": requested,
                })),
            )
                .into_response(),
            OrderingError::OrderNotFound(_) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Order not found" })),
            )
                .into_response(),
            OrderingError::InvalidTransition { current, required } => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": format!("Order must be {} for this action", required),
                    "current_status": current,
                    "required_status": required,
                })),
            )
                .into_response(),
            OrderingError::Validation { ref field, ref rule } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({
                    "error": "Validation error",
                    "field": field,
                    "rule": rule,
                })),
            )
                .into_response(),
            OrderingError::Gateway(err) => {
                tracing::error!(error = %err, "Payment gateway request failed");
                AppError::BadGateway("payment gateway unavailable".to_string()).into_response()
            }
            OrderingError::Infrastructure(err) => err.into_response(),
        }
    }
}
