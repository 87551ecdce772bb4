//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Normalizer (ingested/rejected records, store write failures)
//! - Health ledger (failures, dead variants)
//! - Playback (attempts, session outcomes)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Normalizer
// =============================================================================

/// Records accepted into the catalog, by source kind.
pub static RECORDS_INGESTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "reelmerge_records_ingested_total",
            "Total raw records merged into canonical entries",
        ),
        &["source_kind"], // "chat", "iptv", "other"
    )
    .unwrap()
});

/// Records dropped as malformed, by reason.
pub static RECORDS_REJECTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "reelmerge_records_rejected_total",
            "Total raw records dropped as malformed",
        ),
        &["reason"], // "missing_title", "missing_item_id"
    )
    .unwrap()
});

/// Failed writes to the durable store.
pub static STORE_UPSERT_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "reelmerge_store_upsert_failures_total",
        "Total failed canonical entry upserts (retried next cycle)",
    )
    .unwrap()
});

/// Entries written per flush.
pub static FLUSH_SIZE: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "reelmerge_flush_entries",
            "Number of dirty entries written per flush",
        )
        .buckets(vec![0.0, 1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0]),
        &[],
    )
    .unwrap()
});

// =============================================================================
// Health ledger
// =============================================================================

/// Transport failures recorded against variants.
pub static VARIANT_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "reelmerge_variant_failures_total",
        "Total playback failures recorded in the health ledger",
    )
    .unwrap()
});

/// Variants that crossed the permanence threshold.
pub static VARIANTS_DEAD: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "reelmerge_variants_dead_total",
        "Total variants declared permanently dead",
    )
    .unwrap()
});

// =============================================================================
// Playback
// =============================================================================

/// Playback attempts by result.
pub static PLAYBACK_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "reelmerge_playback_attempts_total",
            "Total playback attempts against individual variants",
        ),
        &["result"], // "success", "failure", "not_ready"
    )
    .unwrap()
});

/// Playback sessions by terminal outcome.
pub static PLAYBACK_SESSIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "reelmerge_playback_sessions_total",
            "Total playback sessions by outcome",
        ),
        &["outcome"], // "playing", "exhausted", "cancelled"
    )
    .unwrap()
});

/// Returns all core metrics for registration with a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Normalizer
        Box::new(RECORDS_INGESTED.clone()),
        Box::new(RECORDS_REJECTED.clone()),
        Box::new(STORE_UPSERT_FAILURES.clone()),
        Box::new(FLUSH_SIZE.clone()),
        // Health
        Box::new(VARIANT_FAILURES.clone()),
        Box::new(VARIANTS_DEAD.clone()),
        // Playback
        Box::new(PLAYBACK_ATTEMPTS.clone()),
        Box::new(PLAYBACK_SESSIONS.clone()),
    ]
}
