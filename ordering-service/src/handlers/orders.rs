//! Order endpoints: placement, listing, reading and cancellation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::dtos::{
    CancelOrderRequest, CancelOrderResponse, CreateOrderRequest, CreateOrderResponse,
    OrderListResponse, OrderResponse,
};
use crate::error::OrderingError;
use crate::middleware::CallerContext;
use crate::models::{Order, OrderDetails};
use crate::services::placement::{PlacementLine, PlacementRequest};
use crate::startup::AppState;

/// Place an order, reserve stock and request the advance charge.
pub async fn create_order(
    State(state): State<AppState>,
    caller: CallerContext,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<CreateOrderResponse>), OrderingError> {
    payload.validate()?;

    let receipt = state
        .placement
        .place(PlacementRequest {
            user_id: caller.user_id,
            table_id: payload.table_id,
            advance_amount: payload.amount,
            reservation_time: payload.reservation_time,
            lines: payload
                .order_items
                .iter()
                .map(|i| PlacementLine {
                    menu_id: i.menu_id,
                    quantity: i.quantity,
                    price: i.price,
                })
                .collect(),
            payer: caller.payer(),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateOrderResponse {
            order_id: receipt.order.id,
            amount: receipt.order.amount,
            advance_amount: receipt.order.advance_amount(),
            remaining_amount: receipt.order.remaining_amount(),
            snap_url: receipt.snap_url,
            snap_token: receipt.snap_token,
        }),
    ))
}

/// The caller's orders, newest first.
pub async fn list_orders(
    State(state): State<AppState>,
    caller: CallerContext,
) -> Result<Json<OrderListResponse>, OrderingError> {
    let orders = state.store.list_orders_for_user(caller.user_id).await?;

    let mut details = Vec::with_capacity(orders.len());
    for order in orders {
        details.push(load_details(&state, order).await?);
    }

    Ok(Json(OrderListResponse { orders: details }))
}

/// One of the caller's orders.
pub async fn get_order(
    State(state): State<AppState>,
    caller: CallerContext,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderResponse>, OrderingError> {
    let order = state
        .store
        .get_order(order_id)
        .await?
        .filter(|o| o.user_id == caller.user_id)
        .ok_or_else(|| OrderingError::order_not_found(order_id))?;

    Ok(Json(OrderResponse {
        order: load_details(&state, order).await?,
    }))
}

/// Cancel a pending order.
pub async fn cancel_order(
    State(state): State<AppState>,
    _caller: CallerContext,
    Json(payload): Json<CancelOrderRequest>,
) -> Result<Json<CancelOrderResponse>, OrderingError> {
    let order = state.reconciliation.cancel_order(payload.order_id).await?;

    Ok(Json(CancelOrderResponse {
        message: "Order cancelled successfully".to_string(),
        order,
    }))
}

async fn load_details(state: &AppState, order: Order) -> Result<OrderDetails, OrderingError> {
    let items = state.store.list_order_items(order.id).await?;
    let table = state.store.get_table(order.table_id).await?;
    let payment = state.store.get_payment(order.id).await?;
    Ok(OrderDetails::new(order, items, table, payment))
}
