//! Types for the normalizer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{EntryKey, RawCatalogRecord, SourceKind};

/// Why a raw record was dropped. Counted, never raised to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordRejection {
    #[error("record {source_ref} has no title")]
    MissingTitle { source_ref: String },

    #[error("{kind} record has no source item id")]
    MissingItemId { kind: SourceKind },
}

impl RecordRejection {
    /// Metric label for this rejection.
    pub fn reason(&self) -> &'static str {
        match self {
            RecordRejection::MissingTitle { .. } => "missing_title",
            RecordRejection::MissingItemId { .. } => "missing_item_id",
        }
    }
}

/// Outcome of ingesting one batch (or a whole stream).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    /// Distinct entries whose variant set or metadata changed.
    pub entries_touched: usize,
    pub records_accepted: usize,
    pub records_rejected: usize,
    /// Entries whose store write failed; they stay dirty for the next cycle.
    pub store_failures: usize,
    pub touched_keys: Vec<EntryKey>,
}

impl IngestSummary {
    pub(crate) fn touch(&mut self, key: &EntryKey) {
        if !self.touched_keys.contains(key) {
            self.touched_keys.push(key.clone());
            self.entries_touched = self.touched_keys.len();
        }
    }

    /// Fold another summary into this one.
    pub fn merge(&mut self, other: IngestSummary) {
        self.records_accepted += other.records_accepted;
        self.records_rejected += other.records_rejected;
        self.store_failures += other.store_failures;
        for key in &other.touched_keys {
            self.touch(key);
        }
    }
}

/// Result of writing dirty entries to the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushReport {
    pub written: usize,
    pub failed: usize,
}

/// One item of a producer's output.
#[derive(Debug, Clone)]
pub enum ProducerEvent {
    Record(RawCatalogRecord),
    /// The scan pass saw everything it was going to see.
    Completed,
    Cancelled,
    Error(String),
}

/// How a producer stream ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum StreamTermination {
    Completed,
    Cancelled,
    Error(String),
}

/// Outcome of consuming a producer stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamReport {
    pub source_kind: SourceKind,
    pub summary: IngestSummary,
    pub termination: StreamTermination,
    /// Variants marked unavailable because a completed pass did not see them.
    pub retired: usize,
}
