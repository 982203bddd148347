//! Prometheus metrics for ordering-service.
//!
//! Domain counters live in the default `prometheus` registry. HTTP request
//! metrics recorded through the `metrics` facade are rendered by the
//! installed Prometheus recorder. `/metrics` serves both.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};
use std::sync::OnceLock;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Orders placed by outcome (created, insufficient_stock, gateway_error, ...).
pub static ORDERS_PLACED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ordering_orders_placed_total",
        "Total number of order placements by outcome",
        &["outcome"]
    )
    .expect("Failed to register orders_placed_total")
});

/// Gateway notifications by mapped order status and outcome.
pub static NOTIFICATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ordering_notifications_total",
        "Total number of payment notifications processed",
        &["mapped_status", "outcome"]
    )
    .expect("Failed to register notifications_total")
});

/// Units of stock returned to inventory, by reason.
pub static STOCK_RELEASED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ordering_stock_released_units_total",
        "Total units of stock released back to inventory",
        &["reason"]
    )
    .expect("Failed to register stock_released_total")
});

/// Staff actions (cancel, confirm_arrival, complete_remaining) by outcome.
pub static MANUAL_ACTIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ordering_manual_actions_total",
        "Total number of manual order actions",
        &["action", "outcome"]
    )
    .expect("Failed to register manual_actions_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "ordering_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Initialize all metrics. Safe to call more than once per process.
pub fn init_metrics() {
    if METRICS_HANDLE.get().is_none() {
        match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                let _ = METRICS_HANDLE.set(handle);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Prometheus recorder already installed");
            }
        }
    }

    Lazy::force(&ORDERS_PLACED_TOTAL);
    Lazy::force(&NOTIFICATIONS_TOTAL);
    Lazy::force(&STOCK_RELEASED_TOTAL);
    Lazy::force(&MANUAL_ACTIONS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_default();

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    output.push_str(
        &encoder
            .encode_to_string(&metric_families)
            .unwrap_or_default(),
    );

    output
}

pub fn record_placement(outcome: &str) {
    ORDERS_PLACED_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_notification(mapped_status: &str, outcome: &str) {
    NOTIFICATIONS_TOTAL
        .with_label_values(&[mapped_status, outcome])
        .inc();
}

pub fn record_stock_released(reason: &str, units: i32) {
    if units > 0 {
        STOCK_RELEASED_TOTAL
            .with_label_values(&[reason])
            .inc_by(f64::from(units));
    }
}

pub fn record_manual_action(action: &str, outcome: &str) {
    MANUAL_ACTIONS_TOTAL
        .with_label_values(&[action, outcome])
        .inc();
}
