mod common;

use common::{TestApp, TEST_USER_ID};
use ordering_service::models::{OrderStatus, PaymentStatus, TableStatus};
use ordering_service::services::Store;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::str::FromStr;

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("not a decimal"),
        other => Decimal::from_str(&other.to_string()).expect("not a decimal"),
    }
}

#[tokio::test]
async fn placing_an_order_doubles_the_advance_and_reserves_stock() {
    let app = TestApp::spawn().await;
    let menu_id = app.seed_menu_item("Nasi Goreng", 15000, 10).await;
    let table_id = app.seed_table().await;

    let response = app
        .post_as_user(
            "/order/store",
            &json!({
                "table_id": table_id,
                "amount": 30000,
                "reservation_time": "2025-07-01T19:00:00Z",
                "order_items": [{ "menu_id": menu_id, "quantity": 4, "price": 15000 }]
            }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(decimal(&body["amount"]), Decimal::new(60000, 0));
    assert_eq!(decimal(&body["advance_amount"]), Decimal::new(30000, 0));
    assert_eq!(decimal(&body["remaining_amount"]), Decimal::new(30000, 0));
    assert!(body["snap_url"].as_str().unwrap().starts_with("https://"));

    assert_eq!(app.stock_of(menu_id).await, 6);

    // The gateway is only ever asked for the advance.
    let charges = app.gateway.charges();
    assert_eq!(charges.len(), 1);
    assert_eq!(charges[0].advance_amount, Decimal::new(30000, 0));
}

#[tokio::test]
async fn insufficient_stock_rejects_without_side_effects() {
    let app = TestApp::spawn().await;
    let plenty = app.seed_menu_item("Es Teh", 5000, 10).await;
    let scarce = app.seed_menu_item("Rendang", 40000, 2).await;
    let table_id = app.seed_table().await;

    let response = app
        .post_as_user(
            "/order/store",
            &json!({
                "table_id": table_id,
                "amount": 50000,
                "reservation_time": "2025-07-01T19:00:00Z",
                "order_items": [
                    { "menu_id": plenty, "quantity": 2, "price": 5000 },
                    { "menu_id": scarce, "quantity": 3, "price": 40000 }
                ]
            }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["menu_id"], scarce);
    assert_eq!(body["available_stock"], 2);
    assert_eq!(body["requested_quantity"], 3);

    assert_eq!(app.stock_of(plenty).await, 10);
    assert_eq!(app.stock_of(scarce).await, 2);
    assert_eq!(app.store.order_count().await, 0);
    assert_eq!(app.store.order_item_count().await, 0);
    assert!(app.gateway.charges().is_empty());
}

#[tokio::test]
async fn placement_validates_the_request() {
    let app = TestApp::spawn().await;
    let table_id = app.seed_table().await;

    let response = app
        .post_as_user(
            "/order/store",
            &json!({
                "table_id": table_id,
                "amount": 10000,
                "reservation_time": "2025-07-01T19:00:00Z",
                "order_items": []
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 422);

    let menu_id = app.seed_menu_item("Soto", 10000, 3).await;
    let response = app
        .post_as_user(
            "/order/store",
            &json!({
                "table_id": 9999,
                "amount": 10000,
                "reservation_time": "2025-07-01T19:00:00Z",
                "order_items": [{ "menu_id": menu_id, "quantity": 1, "price": 10000 }]
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 422);
    assert_eq!(app.stock_of(menu_id).await, 3);

    let response = app
        .post_as_user(
            "/order/store",
            &json!({
                "table_id": table_id,
                "amount": 10000,
                "reservation_time": "2025-07-01T19:00:00Z",
                "order_items": [
                    { "menu_id": menu_id, "quantity": i32::MAX, "price": 10000 },
                    { "menu_id": menu_id, "quantity": i32::MAX, "price": 10000 },
                    { "menu_id": menu_id, "quantity": 4, "price": 10000 }
                ]
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 422);

    let response = app
        .post_as_user(
            "/order/store",
            &json!({
                "table_id": table_id,
                "amount": "79228162514264337593543950335",
                "reservation_time": "2025-07-01T19:00:00Z",
                "order_items": [{ "menu_id": menu_id, "quantity": 1, "price": 10000 }]
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 422);
    assert_eq!(app.stock_of(menu_id).await, 3);
    assert_eq!(app.store.order_count().await, 0);
}

#[tokio::test]
async fn gateway_failure_leaves_a_pending_order() {
    let app = TestApp::spawn().await;
    let menu_id = app.seed_menu_item("Mie Ayam", 12000, 5).await;
    let table_id = app.seed_table().await;
    app.gateway.set_failing(true);

    let response = app
        .post_as_user(
            "/order/store",
            &json!({
                "table_id": table_id,
                "amount": 12000,
                "reservation_time": "2025-07-01T19:00:00Z",
                "order_items": [{ "menu_id": menu_id, "quantity": 2, "price": 12000 }]
            }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 502);
    assert_eq!(app.store.order_count().await, 1);
    assert_eq!(app.stock_of(menu_id).await, 3);
}

#[tokio::test]
async fn missing_caller_identity_is_unauthorized() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(format!("{}/order", app.address))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn settlement_marks_advance_paid_and_reserves_the_table() {
    let app = TestApp::spawn().await;
    let menu_id = app.seed_menu_item("Sate", 10000, 10).await;
    let table_id = app.seed_table().await;
    let order_id = app.place_order(table_id, menu_id, 2, 10000).await;

    let response = app.notify(&order_id.to_string(), "settlement", "10000.00").await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["order_status"], "advance_paid");
    assert_eq!(body["effect"], "applied");

    let order = app.store.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::AdvancePaid);

    let payment = app.store.get_payment(order_id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert_eq!(payment.gross_amount, Decimal::new(10000, 0));
    assert_eq!(payment.remaining_amount, Decimal::new(10000, 0));
    assert_eq!(payment.transaction_status, "settlement");

    let table = app.store.get_table(table_id).await.unwrap().unwrap();
    assert_eq!(table.status, TableStatus::Reserved);
}

#[tokio::test]
async fn expiry_cancels_and_returns_stock_once() {
    let app = TestApp::spawn().await;
    let menu_id = app.seed_menu_item("Gado-gado", 10000, 5).await;
    let table_id = app.seed_table().await;
    let order_id = app.place_order(table_id, menu_id, 3, 15000).await;
    assert_eq!(app.stock_of(menu_id).await, 2);

    let response = app.notify(&order_id.to_string(), "expire", "15000.00").await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["order_status"], "cancelled");
    assert_eq!(app.stock_of(menu_id).await, 5);

    // Redelivery must not release the stock again.
    let response = app.notify(&order_id.to_string(), "expire", "15000.00").await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["effect"], "replayed");
    assert_eq!(app.stock_of(menu_id).await, 5);

    let table = app.store.get_table(table_id).await.unwrap().unwrap();
    assert_eq!(table.status, TableStatus::Available);
    let payment = app.store.get_payment(order_id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Cancelled);
}

#[tokio::test]
async fn late_failure_after_settlement_is_ignored() {
    let app = TestApp::spawn().await;
    let menu_id = app.seed_menu_item("Bakso", 10000, 5).await;
    let table_id = app.seed_table().await;
    let order_id = app.place_order(table_id, menu_id, 1, 5000).await;

    app.notify(&order_id.to_string(), "settlement", "5000.00").await;
    let response = app.notify(&order_id.to_string(), "deny", "5000.00").await;

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["effect"], "ignored");
    assert_eq!(body["order_status"], "advance_paid");
    assert_eq!(app.stock_of(menu_id).await, 4);
}

#[tokio::test]
async fn notification_for_unknown_order_is_not_found() {
    let app = TestApp::spawn().await;

    let response = app
        .notify("00000000-0000-0000-0000-000000000000", "settlement", "10000.00")
        .await;
    assert_eq!(response.status().as_u16(), 404);

    let response = app.notify("not-an-order", "settlement", "10000.00").await;
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn malformed_notification_is_acknowledged_and_ignored() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .post(format!("{}/payment/notification", app.address))
        .json(&json!({ "transaction_status": "settlement" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ignored");
}

#[tokio::test]
async fn completing_remaining_on_a_pending_order_is_rejected() {
    let app = TestApp::spawn().await;
    let menu_id = app.seed_menu_item("Pecel", 8000, 5).await;
    let table_id = app.seed_table().await;
    let order_id = app.place_order(table_id, menu_id, 1, 4000).await;

    let response = app
        .post_as_user(
            "/payment/complete-remaining",
            &json!({ "order_id": order_id, "payment_method": "cash" }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["current_status"], "pending");
    assert_eq!(body["required_status"], "advance_paid");

    let order = app.store.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
}

#[tokio::test]
async fn full_lifecycle_from_placement_to_completion() {
    let app = TestApp::spawn().await;
    let menu_id = app.seed_menu_item("Ayam Bakar", 25000, 8).await;
    let table_id = app.seed_table().await;
    let order_id = app.place_order(table_id, menu_id, 2, 25000).await;

    app.notify(&order_id.to_string(), "capture", "25000.00").await;

    let response = app
        .post_as_user(
            "/payment/complete-remaining",
            &json!({ "order_id": order_id, "payment_method": "cash", "staff_id": 7 }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["order"]["status"], "completed");
    assert_eq!(decimal(&body["total_paid"]), Decimal::new(50000, 0));
    assert_eq!(decimal(&body["advance_paid"]), Decimal::new(25000, 0));
    assert_eq!(decimal(&body["remaining_paid"]), Decimal::new(25000, 0));

    let payment = app.store.get_payment(order_id).await.unwrap().unwrap();
    assert_eq!(payment.remaining_payment_method.as_deref(), Some("cash"));
    assert_eq!(payment.remaining_paid_by, Some(7));
    assert!(payment.is_fully_paid());

    let table = app.store.get_table(table_id).await.unwrap().unwrap();
    assert_eq!(table.status, TableStatus::InUse);

    // A redelivered capture keeps the remaining-payment record.
    let response = app.notify(&order_id.to_string(), "capture", "25000.00").await;
    assert_eq!(response.status().as_u16(), 200);
    let payment = app.store.get_payment(order_id).await.unwrap().unwrap();
    let data = payment.payment_data.unwrap();
    assert_eq!(data["remaining_payment"]["method"], "cash");
    assert_eq!(data["remaining_payment"]["staff_id"], 7);

    let response = app.get_as_user(&format!("/order/{}", order_id)).await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["order"]["is_completed"], true);
    assert_eq!(body["order"]["is_fully_paid"], true);

    // A second completion is rejected.
    let response = app
        .post_as_user(
            "/payment/complete-remaining",
            &json!({ "order_id": order_id, "payment_method": "cash" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn arrival_confirmation_closes_remaining_payment() {
    let app = TestApp::spawn().await;
    let menu_id = app.seed_menu_item("Ikan Bakar", 30000, 4).await;
    let table_id = app.seed_table().await;
    let order_id = app.place_order(table_id, menu_id, 1, 15000).await;

    app.notify(&order_id.to_string(), "settlement", "15000.00").await;

    let response = app
        .post_as_user(
            "/payment/confirm-arrival",
            &json!({ "order_id": order_id, "staff_id": 7 }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["order"]["status"], "confirmed");
    assert_eq!(decimal(&body["remaining_amount_due"]), Decimal::new(15000, 0));

    let response = app
        .post_as_user(
            "/payment/complete-remaining",
            &json!({ "order_id": order_id, "payment_method": "cash", "staff_id": 7 }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["current_status"], "confirmed");
    assert_eq!(body["required_status"], "advance_paid");

    let order = app.store.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Confirmed);
    let payment = app.store.get_payment(order_id).await.unwrap().unwrap();
    assert!(payment.remaining_paid_at.is_none());
    let table = app.store.get_table(table_id).await.unwrap().unwrap();
    assert_eq!(table.status, TableStatus::Occupied);
}

#[tokio::test]
async fn duplicate_settlement_changes_nothing() {
    let app = TestApp::spawn().await;
    let menu_id = app.seed_menu_item("Rawon", 10000, 6).await;
    let table_id = app.seed_table().await;
    let order_id = app.place_order(table_id, menu_id, 2, 10000).await;

    app.notify(&order_id.to_string(), "settlement", "10000.00").await;
    let order_before = app.store.get_order(order_id).await.unwrap().unwrap();
    let payment_before = app.store.get_payment(order_id).await.unwrap().unwrap();
    let table_before = app.store.get_table(table_id).await.unwrap().unwrap();

    let response = app.notify(&order_id.to_string(), "settlement", "10000.00").await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["effect"], "replayed");
    assert_eq!(body["order_status"], "advance_paid");

    let order_after = app.store.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order_after.status, order_before.status);
    assert_eq!(order_after.updated_utc, order_before.updated_utc);

    let payment_after = app.store.get_payment(order_id).await.unwrap().unwrap();
    assert_eq!(payment_after.status, payment_before.status);
    assert_eq!(payment_after.transaction_status, payment_before.transaction_status);
    assert_eq!(payment_after.gross_amount, payment_before.gross_amount);
    assert_eq!(payment_after.remaining_amount, payment_before.remaining_amount);
    assert_eq!(payment_after.payment_data, payment_before.payment_data);

    let table_after = app.store.get_table(table_id).await.unwrap().unwrap();
    assert_eq!(table_after.status, table_before.status);
    assert_eq!(table_after.updated_utc, table_before.updated_utc);
    assert_eq!(app.stock_of(menu_id).await, 4);
}

#[tokio::test]
async fn customer_can_cancel_a_pending_order() {
    let app = TestApp::spawn().await;
    let menu_id = app.seed_menu_item("Martabak", 20000, 4).await;
    let table_id = app.seed_table().await;
    let order_id = app.place_order(table_id, menu_id, 4, 40000).await;
    assert_eq!(app.stock_of(menu_id).await, 0);

    let response = app
        .post_as_user("/order/cancel", &json!({ "order_id": order_id }))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["order"]["status"], "cancelled");
    assert_eq!(app.stock_of(menu_id).await, 4);

    let response = app
        .post_as_user("/order/cancel", &json!({ "order_id": order_id }))
        .await;
    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(app.stock_of(menu_id).await, 4);
}

#[tokio::test]
async fn orders_are_listed_and_read_per_caller() {
    let app = TestApp::spawn().await;
    let menu_id = app.seed_menu_item("Nasi Uduk", 10000, 10).await;
    let table_id = app.seed_table().await;
    let order_id = app.place_order(table_id, menu_id, 2, 10000).await;

    let response = app.get_as_user("/order").await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    let orders = body["orders"].as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["id"], order_id.to_string());
    assert_eq!(orders[0]["user_id"], TEST_USER_ID);
    assert_eq!(orders[0]["items"].as_array().unwrap().len(), 1);
    assert_eq!(orders[0]["table"]["id"], table_id);

    let response = app.get_as_user(&format!("/order/{}", order_id)).await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["order"]["status"], "pending");

    // Another caller cannot see it.
    let response = app
        .client
        .get(format!("{}/order/{}", app.address, order_id))
        .header("x-user-id", "7")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn payment_status_reflects_notifications() {
    let app = TestApp::spawn().await;
    let menu_id = app.seed_menu_item("Tahu", 6000, 10).await;
    let table_id = app.seed_table().await;
    let order_id = app.place_order(table_id, menu_id, 1, 3000).await;

    let response = app
        .get_as_user(&format!("/payment/status?order_id={}", order_id))
        .await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["order_status"], "pending");
    assert!(body["payment"].is_null());

    app.notify(&order_id.to_string(), "pending", "3000.00").await;

    let response = app
        .get_as_user(&format!("/payment/status?order_id={}", order_id))
        .await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["order_status"], "pending");
    assert_eq!(body["payment"]["transaction_status"], "pending");
}

#[tokio::test]
async fn menu_listing_filters_by_stock() {
    let app = TestApp::spawn().await;
    app.seed_menu_item("Kopi", 8000, 3).await;
    app.seed_menu_item("Klepon", 5000, 0).await;

    let response = app
        .client
        .get(format!("{}/menu?stock=out_of_stock", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["name"], "Klepon");
    assert_eq!(items[0]["is_out_of_stock"], true);

    let response = app
        .client
        .get(format!("{}/menu?stock=available", app.address))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["is_available"], true);
}
