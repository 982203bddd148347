use ordering_service::config::OrderingConfig;
use ordering_service::services::{MemoryStore, MockGateway, Store};
use ordering_service::startup::Application;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

pub const TEST_USER_ID: i64 = 42;
pub const TEST_RESTAURANT_ID: i64 = 1;

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub store: Arc<MemoryStore>,
    pub gateway: Arc<MockGateway>,
    pub client: reqwest::Client,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(MockGateway::new());

        let app = Application::build_with(OrderingConfig::for_local(0), store.clone(), gateway.clone())
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for HTTP server to be ready by polling health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            store,
            gateway,
            client,
        }
    }

    pub async fn seed_menu_item(&self, name: &str, price: i64, stock: i32) -> i64 {
        self.store
            .insert_menu_item(TEST_RESTAURANT_ID, name, Decimal::new(price, 0), stock)
            .await
            .id
    }

    pub async fn seed_table(&self) -> i64 {
        self.store.insert_table(TEST_RESTAURANT_ID, 4).await.id
    }

    pub async fn stock_of(&self, menu_id: i64) -> i32 {
        self.store
            .get_menu_item(menu_id)
            .await
            .expect("store error")
            .expect("menu item missing")
            .stock
    }

    pub async fn post_as_user(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.address, path))
            .header("x-user-id", TEST_USER_ID.to_string())
            .header("x-user-name", "Budi")
            .header("x-user-email", "budi@example.com")
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn get_as_user(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.address, path))
            .header("x-user-id", TEST_USER_ID.to_string())
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Place an order for `quantity` units of `menu_id` and return its id.
    pub async fn place_order(&self, table_id: i64, menu_id: i64, quantity: i32, advance: i64) -> Uuid {
        let response = self
            .post_as_user(
                "/order/store",
                &json!({
                    "table_id": table_id,
                    "amount": advance,
                    "reservation_time": "2025-07-01T19:00:00Z",
                    "order_items": [{ "menu_id": menu_id, "quantity": quantity, "price": 10000 }]
                }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 201, "order placement failed");

        let body: Value = response.json().await.expect("Failed to parse JSON");
        body["order_id"]
            .as_str()
            .and_then(|id| Uuid::parse_str(id).ok())
            .expect("order_id missing")
    }

    /// Deliver a gateway notification.
    pub async fn notify(&self, order_id: &str, transaction_status: &str, gross_amount: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/payment/notification", self.address))
            .json(&json!({
                "order_id": order_id,
                "transaction_id": format!("tx-{}", order_id),
                "transaction_status": transaction_status,
                "fraud_status": "accept",
                "payment_type": "bank_transfer",
                "gross_amount": gross_amount,
                "status_code": "200"
            }))
            .send()
            .await
            .expect("Failed to execute request")
    }
}
