//! Types for the variant health ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::SourceRef;

/// Failure memory for one variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantHealthRecord {
    pub source_ref: SourceRef,
    pub failure_count: u32,
    pub first_failure_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    /// Sticky once set; only an explicit reset clears it.
    pub permanently_dead: bool,
    /// Last recorded failure or success. Reads never move it, so eviction
    /// drops the least recently written records.
    #[serde(skip)]
    pub(crate) last_touched: Option<DateTime<Utc>>,
}

impl VariantHealthRecord {
    pub(crate) fn new(source_ref: SourceRef, now: DateTime<Utc>) -> Self {
        Self {
            source_ref,
            failure_count: 0,
            first_failure_at: None,
            last_failure_at: None,
            last_success_at: None,
            permanently_dead: false,
            last_touched: Some(now),
        }
    }
}

/// What a recorded failure did to a variant's health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthTransition {
    /// Failure counted, variant still eligible.
    Degraded,
    /// This failure crossed the permanence threshold.
    BecameDead,
    /// Variant was already dead.
    AlreadyDead,
}
