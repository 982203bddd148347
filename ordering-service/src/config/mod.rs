//! Configuration module for ordering-service.

use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

const MIDTRANS_SANDBOX_URL: &str = "https://app.sandbox.midtrans.com";
const MIDTRANS_PRODUCTION_URL: &str = "https://app.midtrans.com";

#[derive(Debug, Clone)]
pub struct OrderingConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub midtrans: MidtransConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct MidtransConfig {
    pub server_key: Secret<String>,
    pub client_key: String,
    pub is_production: bool,
    pub snap_base_url: String,
    pub timeout_secs: u64,
}

impl MidtransConfig {
    fn from_env() -> Self {
        let is_production = env::var("MIDTRANS_IS_PRODUCTION")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(false);
        let default_url = if is_production {
            MIDTRANS_PRODUCTION_URL
        } else {
            MIDTRANS_SANDBOX_URL
        };

        Self {
            server_key: Secret::new(env::var("MIDTRANS_SERVER_KEY").unwrap_or_default()),
            client_key: env::var("MIDTRANS_CLIENT_KEY").unwrap_or_default(),
            is_production,
            snap_base_url: env::var("MIDTRANS_SNAP_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| default_url.to_string()),
            timeout_secs: env::var("MIDTRANS_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
        }
    }
}

impl OrderingConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "ordering-service".to_string()),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
            database: DatabaseConfig {
                url: Secret::new(env::var("DATABASE_URL").map_err(|_| {
                    AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is required"))
                })?),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
                min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2),
            },
            midtrans: MidtransConfig::from_env(),
        })
    }

    /// Configuration for running against in-process collaborators.
    pub fn for_local(port: u16) -> Self {
        Self {
            common: core_config::Config {
                port,
                ..Default::default()
            },
            service_name: "ordering-service".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: "info".to_string(),
            otlp_endpoint: None,
            database: DatabaseConfig {
                url: Secret::new(String::new()),
                max_connections: 1,
                min_connections: 0,
            },
            midtrans: MidtransConfig {
                server_key: Secret::new(String::new()),
                client_key: String::new(),
                is_production: false,
                snap_base_url: MIDTRANS_SANDBOX_URL.to_string(),
                timeout_secs: 5,
            },
        }
    }
}
