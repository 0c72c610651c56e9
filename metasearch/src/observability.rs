//! Tracing setup and service metrics.
//!
//! Metrics go through the `metrics` facade; the server decides whether an
//! exporter is installed.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Install the global tracing subscriber with a pretty or json fmt layer.
///
/// Returns an error if a subscriber is already installed.
pub fn init_tracing(config: &ObservabilityConfig) -> crate::Result<()> {
    let registry = tracing_subscriber::registry().with(EnvFilter::new(&config.log_level));

    let result = match config.log_format.as_str() {
        "json" => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .try_init(),
        _ => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };
    result.map_err(|e| crate::Error::Config(format!("cannot install tracing subscriber: {}", e)))
}

/// Record the outcome of one search request (`ok`, `error`, `invalid`, `rejected`).
pub fn record_search(class_name: &str, outcome: &'static str) {
    metrics::counter!(
        "metasearch_searches_total",
        "class" => class_name.to_string(),
        "outcome" => outcome,
    )
    .increment(1);
}

pub fn record_index_recreation(class_name: &str) {
    metrics::counter!(
        "metasearch_index_recreations_total",
        "class" => class_name.to_string(),
    )
    .increment(1);
}

pub fn record_resource_upserted(class_name: &str) {
    metrics::counter!(
        "metasearch_resources_upserted_total",
        "class" => class_name.to_string(),
    )
    .increment(1);
}

pub fn record_resource_deleted(class_name: &str) {
    metrics::counter!(
        "metasearch_resources_deleted_total",
        "class" => class_name.to_string(),
    )
    .increment(1);
}

/// Record how an ingestion event was handled (`processed`, `rejected`, `skipped`, `failed`).
pub fn record_event_consumed(event_type: &str, outcome: &'static str) {
    metrics::counter!(
        "metasearch_events_consumed_total",
        "type" => event_type.to_string(),
        "outcome" => outcome,
    )
    .increment(1);
}
