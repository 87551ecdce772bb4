//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the reelmerge server:
//! - HTTP request metrics (latency, counts)
//! - Catalog and ledger sizes (collected dynamically)
//! - Everything the core library exports

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use regex_lite::Regex;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "reelmerge_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelmerge_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "reelmerge_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Catalog Metrics (collected dynamically)
// =============================================================================

/// Canonical entries held in memory.
pub static CATALOG_ENTRIES: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "reelmerge_catalog_entries",
        "Number of canonical entries held in memory",
    )
    .unwrap()
});

/// Entries waiting for a successful store write.
pub static CATALOG_DIRTY_ENTRIES: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "reelmerge_catalog_dirty_entries",
        "Number of entries not yet written to the store",
    )
    .unwrap()
});

/// Variants tracked by the health ledger.
pub static HEALTH_RECORDS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "reelmerge_health_records",
        "Number of variants tracked by the health ledger",
    )
    .unwrap()
});

/// Active manual overrides.
pub static OVERRIDES_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "reelmerge_overrides_active",
        "Number of active manual variant overrides",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Catalog
    registry
        .register(Box::new(CATALOG_ENTRIES.clone()))
        .unwrap();
    registry
        .register(Box::new(CATALOG_DIRTY_ENTRIES.clone()))
        .unwrap();
    registry.register(Box::new(HEALTH_RECORDS.clone())).unwrap();
    registry
        .register(Box::new(OVERRIDES_ACTIVE.clone()))
        .unwrap();

    // Core metrics (normalizer, health, playback)
    for metric in reelmerge_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so the gauges reflect current sizes.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    CATALOG_ENTRIES.set(state.normalizer().len() as i64);
    CATALOG_DIRTY_ENTRIES.set(state.normalizer().dirty_count() as i64);
    HEALTH_RECORDS.set(state.health().len() as i64);
    OVERRIDES_ACTIVE.set(state.overrides().len() as i64);
}

static ENTRY_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/entries/[^/]+").unwrap());
static VARIANT_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/variants/[^/]+").unwrap());

/// Normalize a path for metric labels (replace keys with placeholders).
pub fn normalize_path(path: &str) -> String {
    let result = ENTRY_SEGMENT.replace_all(path, "/entries/{key}");
    let result = VARIANT_SEGMENT.replace_all(&result, "/variants/{source_ref}");
    result.to_string()
}
