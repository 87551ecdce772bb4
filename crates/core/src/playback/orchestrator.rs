use std::sync::Arc;

use tracing::debug;

use super::readiness;
use super::{CancelHandle, Outcome, PlaybackSession, PlaybackTransport};
use crate::catalog::{CanonicalEntry, SourceRef, Variant};
use crate::health::{HealthTransition, VariantHealthLedger};
use crate::ranking::{rank, PlaybackPreferences};

/// Entry point for the playback/UI layer.
///
/// Builds candidate lists from entries plus live health, opens sessions, and
/// feeds externally observed outcomes back into the ledger.
pub struct PlaybackOrchestrator {
    health: Arc<VariantHealthLedger>,
    transport: Arc<dyn PlaybackTransport>,
}

impl PlaybackOrchestrator {
    pub fn new(health: Arc<VariantHealthLedger>, transport: Arc<dyn PlaybackTransport>) -> Self {
        Self { health, transport }
    }

    pub fn health(&self) -> &Arc<VariantHealthLedger> {
        &self.health
    }

    /// Ordered candidates for an entry.
    ///
    /// The override, if it still names one of the entry's variants, goes first
    /// regardless of its health; the rest follow in ranked order without it.
    pub fn resolve_active_variant(
        &self,
        entry: &CanonicalEntry,
        manual_override: Option<&SourceRef>,
        prefs: &PlaybackPreferences,
    ) -> Vec<Variant> {
        let mut ranked = rank(&entry.variants, prefs, self.health.as_ref());

        if let Some(pinned) = manual_override {
            match ranked.iter().position(|v| &v.source_ref == pinned) {
                Some(idx) => {
                    let variant = ranked.remove(idx);
                    ranked.insert(0, variant);
                }
                None => {
                    debug!(entry = %entry.key, %pinned, "Ignoring override for a variant the entry no longer has");
                }
            }
        }
        ranked
    }

    /// Record an outcome observed outside a session.
    ///
    /// Returns the health transition for failures.
    pub fn report_outcome(&self, source_ref: &SourceRef, outcome: Outcome) -> Option<HealthTransition> {
        match outcome {
            Outcome::Success => {
                self.health.record_success(source_ref);
                None
            }
            Outcome::Failure => Some(self.health.record_failure(source_ref)),
        }
    }

    pub fn is_playback_ready(&self, variant: &Variant) -> bool {
        readiness::is_playback_ready(variant)
    }

    /// Open a session over the entry's current candidate list.
    pub fn open_session(
        &self,
        entry: &CanonicalEntry,
        manual_override: Option<&SourceRef>,
        prefs: &PlaybackPreferences,
    ) -> (PlaybackSession, CancelHandle) {
        let candidates = self.resolve_active_variant(entry, manual_override, prefs);
        PlaybackSession::new(
            entry.key.clone(),
            candidates,
            Arc::clone(&self.health),
            Arc::clone(&self.transport),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HealthConfig;
    use crate::testing::{fixtures, MockTransport};

    fn orchestrator() -> PlaybackOrchestrator {
        PlaybackOrchestrator::new(
            Arc::new(VariantHealthLedger::new(HealthConfig::default())),
            Arc::new(MockTransport::new()),
        )
    }

    fn order(candidates: &[Variant]) -> Vec<String> {
        candidates.iter().map(|v| v.source_ref.to_string()).collect()
    }

    #[test]
    fn test_override_goes_first_once() {
        let o = orchestrator();
        let entry = fixtures::entry_with_heights(&[("chat:a", 480), ("chat:b", 720), ("chat:c", 1080)]);
        let pinned: SourceRef = "chat:a".parse().unwrap();

        let candidates =
            o.resolve_active_variant(&entry, Some(&pinned), &PlaybackPreferences::default());
        assert_eq!(order(&candidates), vec!["chat:a", "chat:c", "chat:b"]);
    }

    #[test]
    fn test_stale_override_is_ignored() {
        let o = orchestrator();
        let entry = fixtures::entry_with_heights(&[("chat:a", 480), ("chat:b", 720)]);
        let gone: SourceRef = "iptv:zzz".parse().unwrap();

        let candidates =
            o.resolve_active_variant(&entry, Some(&gone), &PlaybackPreferences::default());
        assert_eq!(order(&candidates), vec!["chat:b", "chat:a"]);
    }

    #[test]
    fn test_report_outcome_feeds_ledger() {
        let o = orchestrator();
        let r: SourceRef = "iptv:1".parse().unwrap();

        assert_eq!(
            o.report_outcome(&r, Outcome::Failure),
            Some(HealthTransition::Degraded)
        );
        assert_eq!(o.report_outcome(&r, Outcome::Success), None);

        let record = o.health().snapshot(&r).unwrap();
        assert_eq!(record.failure_count, 1);
        assert!(record.last_success_at.is_some());
    }
}
