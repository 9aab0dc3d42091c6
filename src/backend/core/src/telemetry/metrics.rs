//! Reconciler metrics.
//!
//! Everything goes through the `metrics` facade; without an installed
//! recorder the calls are no-ops, which is what the tests rely on.

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus exporter on `listen_addr` and register descriptions.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(listen_addr: &str) -> anyhow::Result<()> {
    let addr: SocketAddr = listen_addr.parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    register_metric_descriptions();

    tracing::info!(endpoint = %addr, "Metrics initialized");
    Ok(())
}

fn register_metric_descriptions() {
    describe_counter!(
        "todolist_events_total",
        "Lifecycle events handed to the reconciliation engine"
    );
    describe_counter!(
        "todolist_events_skipped_total",
        "ConfigMap events ignored because they carry no task"
    );
    describe_counter!(
        "todolist_events_failed_total",
        "Events dropped after a store read or write failure"
    );
    describe_counter!(
        "todolist_store_writes_total",
        "Successful writes of the todo map to the durable store"
    );
    describe_counter!(
        "todolist_publish_total",
        "Downstream publish attempts by outcome"
    );
    describe_counter!(
        "todolist_errors_total",
        "Errors constructed, by code and category"
    );
    describe_gauge!(
        "todolist_buffered_items",
        "Items held in the pre-store buffer"
    );
    describe_gauge!(
        "todolist_store_items",
        "Items in the todo map after the last write"
    );
}

pub(crate) fn record_event(phase: &'static str) {
    counter!("todolist_events_total", "phase" => phase).increment(1);
}

pub(crate) fn record_event_skipped() {
    counter!("todolist_events_skipped_total").increment(1);
}

pub(crate) fn record_event_failed() {
    counter!("todolist_events_failed_total").increment(1);
}

pub(crate) fn record_store_write(items: usize) {
    counter!("todolist_store_writes_total").increment(1);
    gauge!("todolist_store_items").set(items as f64);
}

pub(crate) fn record_publish(outcome: &'static str) {
    counter!("todolist_publish_total", "outcome" => outcome).increment(1);
}

pub(crate) fn set_buffered_items(items: usize) {
    gauge!("todolist_buffered_items").set(items as f64);
}
