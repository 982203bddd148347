//! Application startup and lifecycle management.

use crate::config::OrderingConfig;
use crate::handlers;
use crate::services::{
    init_metrics, MidtransClient, OrderPlacement, PaymentGateway, PgStore, ReconciliationEngine,
    Store,
};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::{
    metrics_middleware, request_id_middleware, security_headers_middleware, REQUEST_ID_HEADER,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: OrderingConfig,
    pub store: Arc<dyn Store>,
    pub placement: OrderPlacement,
    pub reconciliation: ReconciliationEngine,
}

impl AppState {
    pub fn new(
        config: OrderingConfig,
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            placement: OrderPlacement::new(store.clone(), gateway),
            reconciliation: ReconciliationEngine::new(store.clone()),
            store,
            config,
        }
    }
}

/// Build the HTTP router for the given state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics))
        .route("/menu", get(handlers::menus::list_menu))
        .route("/order", get(handlers::orders::list_orders))
        .route("/order/store", post(handlers::orders::create_order))
        .route("/order/cancel", post(handlers::orders::cancel_order))
        .route("/order/:id", get(handlers::orders::get_order))
        .route("/payment/notification", post(handlers::payments::notification))
        .route("/payment/status", get(handlers::payments::payment_status))
        .route(
            "/payment/complete-remaining",
            post(handlers::payments::complete_remaining),
        )
        .route(
            "/payment/confirm-arrival",
            post(handlers::payments::confirm_arrival),
        )
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    user_id = tracing::field::Empty,
                )
            }),
        )
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application against PostgreSQL and Midtrans.
    pub async fn build(config: OrderingConfig) -> Result<Self, AppError> {
        Self::build_internal(config, true).await
    }

    /// Build the application without running migrations.
    /// Use this when the schema is managed outside the service.
    pub async fn build_without_migrations(config: OrderingConfig) -> Result<Self, AppError> {
        Self::build_internal(config, false).await
    }

    async fn build_internal(config: OrderingConfig, run_migrations: bool) -> Result<Self, AppError> {
        let store = PgStore::new(
            config.database.url.expose_secret(),
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            e
        })?;

        if run_migrations {
            store.run_migrations().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to run migrations");
                e
            })?;
        }

        let midtrans = MidtransClient::new(config.midtrans.clone());
        if midtrans.is_configured() {
            tracing::info!(
                is_production = config.midtrans.is_production,
                "Midtrans client initialized"
            );
        } else {
            tracing::warn!("Midtrans server key not configured - payment creation will fail");
        }

        Self::build_with(config, Arc::new(store), Arc::new(midtrans)).await
    }

    /// Build the application around an existing store and gateway.
    pub async fn build_with(
        config: OrderingConfig,
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Result<Self, AppError> {
        init_metrics();

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(http_port = port, "Ordering service listener bound");

        Ok(Self {
            port,
            listener,
            state: AppState::new(config, store, gateway),
        })
    }

    /// Get the HTTP port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let app = router(self.state);

        axum::serve(self.listener, app).await.map_err(|e| {
            tracing::error!(error = %e, "HTTP server error");
            std::io::Error::other(format!("HTTP server error: {}", e))
        })
    }
}
