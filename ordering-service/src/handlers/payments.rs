//! Payment endpoints: gateway notifications, status reads and the staff
//! actions that finish an order at the restaurant.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::dtos::{
    CompleteRemainingRequest, CompleteRemainingResponse, ConfirmArrivalRequest,
    ConfirmArrivalResponse, NotificationAck, PaymentStatusQuery, PaymentStatusResponse,
};
use crate::error::OrderingError;
use crate::middleware::CallerContext;
use crate::startup::AppState;
use validator::Validate;

/// Gateway webhook.
///
/// Business rejections are acknowledged with 200 so the gateway stops
/// retrying; unknown orders get 404 and internal faults a generic 500.
pub async fn notification(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> Response {
    match state.reconciliation.handle_notification(&payload).await {
        Ok(result) => (
            StatusCode::OK,
            Json(NotificationAck {
                status: "ok",
                order_id: Some(result.order_id),
                order_status: Some(result.order_status),
                effect: Some(result.effect.as_str()),
                reason: None,
            }),
        )
            .into_response(),
        Err(e) if e.is_business_rejection() => (
            StatusCode::OK,
            Json(NotificationAck {
                status: "ignored",
                order_id: None,
                order_status: None,
                effect: None,
                reason: Some(e.to_string()),
            }),
        )
            .into_response(),
        Err(OrderingError::OrderNotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Order not found" })),
        )
            .into_response(),
        Err(e @ OrderingError::Infrastructure(_)) => e.into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Unexpected notification failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to process notification" })),
            )
                .into_response()
        }
    }
}

/// Order status with its payment row.
pub async fn payment_status(
    State(state): State<AppState>,
    _caller: CallerContext,
    Query(query): Query<PaymentStatusQuery>,
) -> Result<Json<PaymentStatusResponse>, OrderingError> {
    let view = state.reconciliation.payment_status(query.order_id).await?;

    Ok(Json(PaymentStatusResponse {
        order_id: view.order_id,
        order_status: view.order_status,
        payment: view.payment,
    }))
}

/// Staff record the remaining 50% paid at the restaurant.
pub async fn complete_remaining(
    State(state): State<AppState>,
    _caller: CallerContext,
    Json(payload): Json<CompleteRemainingRequest>,
) -> Result<Json<CompleteRemainingResponse>, OrderingError> {
    payload.validate()?;

    let settlement = state
        .reconciliation
        .complete_remaining_payment(payload.order_id, &payload.payment_method, payload.staff_id)
        .await?;

    Ok(Json(CompleteRemainingResponse {
        message: "Remaining payment completed successfully".to_string(),
        order: settlement.order,
        payment: settlement.payment,
        total_paid: settlement.total_paid,
        advance_paid: settlement.advance_paid,
        remaining_paid: settlement.remaining_paid,
    }))
}

/// Staff confirm the customer has arrived.
pub async fn confirm_arrival(
    State(state): State<AppState>,
    _caller: CallerContext,
    Json(payload): Json<ConfirmArrivalRequest>,
) -> Result<Json<ConfirmArrivalResponse>, OrderingError> {
    let confirmation = state
        .reconciliation
        .confirm_arrival(payload.order_id, payload.staff_id)
        .await?;

    Ok(Json(ConfirmArrivalResponse {
        message: "Customer arrival confirmed".to_string(),
        order: confirmation.order,
        remaining_amount_due: confirmation.remaining_amount_due,
    }))
}
