use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use super::{Clock, HealthTransition, SystemClock, VariantHealthRecord};
use crate::catalog::{SourceRef, Variant};
use crate::config::HealthConfig;
use crate::metrics;
use crate::ranking::HealthLookup;

/// Concurrent failure tracker keyed by variant.
///
/// Each record is updated under its shard lock, so increment-and-check is
/// atomic per variant while unrelated variants never contend.
pub struct VariantHealthLedger {
    records: DashMap<SourceRef, VariantHealthRecord>,
    config: HealthConfig,
    clock: Arc<dyn Clock>,
}

impl VariantHealthLedger {
    pub fn new(config: HealthConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: HealthConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: DashMap::new(),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// Record a transport failure for a variant.
    pub fn record_failure(&self, source_ref: &SourceRef) -> HealthTransition {
        let now = self.clock.now();
        let dead_after = self.config.dead_after();

        let (transition, failure_count) = {
            let mut record = self
                .records
                .entry(source_ref.clone())
                .or_insert_with(|| VariantHealthRecord::new(source_ref.clone(), now));

            record.failure_count = record.failure_count.saturating_add(1);
            let first = *record.first_failure_at.get_or_insert(now);
            record.last_failure_at = Some(now);
            record.last_touched = Some(now);

            let transition = if record.permanently_dead {
                HealthTransition::AlreadyDead
            } else if record.failure_count >= self.config.failure_threshold
                && now.signed_duration_since(first) >= dead_after
            {
                record.permanently_dead = true;
                HealthTransition::BecameDead
            } else {
                HealthTransition::Degraded
            };
            (transition, record.failure_count)
        };

        metrics::VARIANT_FAILURES.inc();
        match transition {
            HealthTransition::BecameDead => {
                metrics::VARIANTS_DEAD.inc();
                warn!(
                    source_ref = %source_ref,
                    failure_count,
                    "Variant declared permanently dead"
                );
            }
            _ => debug!(source_ref = %source_ref, failure_count, ?transition, "Recorded variant failure"),
        }

        self.evict_if_needed(source_ref);
        transition
    }

    /// Record a successful playback. Failure history is kept as is.
    pub fn record_success(&self, source_ref: &SourceRef) {
        if let Some(mut record) = self.records.get_mut(source_ref) {
            let now = self.clock.now();
            record.last_success_at = Some(now);
            record.last_touched = Some(now);
        }
    }

    pub fn is_permanently_dead(&self, source_ref: &SourceRef) -> bool {
        self.records
            .get(source_ref)
            .map(|r| r.permanently_dead)
            .unwrap_or(false)
    }

    /// Producer says it is available and the ledger does not consider it dead.
    pub fn is_available(&self, variant: &Variant) -> bool {
        variant.available && !self.is_permanently_dead(&variant.source_ref)
    }

    /// Copy of the current record, if the variant ever failed.
    pub fn snapshot(&self, source_ref: &SourceRef) -> Option<VariantHealthRecord> {
        self.records.get(source_ref).map(|r| r.clone())
    }

    /// Forget a variant's history. Returns true if there was one.
    pub fn reset(&self, source_ref: &SourceRef) -> bool {
        let removed = self.records.remove(source_ref).is_some();
        if removed {
            debug!(source_ref = %source_ref, "Reset variant health");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop least-recently-touched records once over capacity.
    ///
    /// Shrinks to 90% of capacity so eviction does not run on every write.
    fn evict_if_needed(&self, keep: &SourceRef) {
        let max = self.config.max_records;
        if self.records.len() <= max {
            return;
        }

        let target = max - max / 10;
        let excess = self.records.len().saturating_sub(target);
        let mut candidates: Vec<(Option<chrono::DateTime<chrono::Utc>>, SourceRef)> = self
            .records
            .iter()
            .filter(|r| r.key() != keep)
            .map(|r| (r.last_touched, r.key().clone()))
            .collect();
        candidates.sort();

        for (_, source_ref) in candidates.into_iter().take(excess) {
            self.records.remove(&source_ref);
        }
        debug!(evicted = excess, remaining = self.records.len(), "Evicted health records");
    }
}

impl HealthLookup for VariantHealthLedger {
    fn is_permanently_dead(&self, source_ref: &SourceRef) -> bool {
        VariantHealthLedger::is_permanently_dead(self, source_ref)
    }
}
