//! Per-session playback state machine.
//!
//! `Selecting -> Attempting -> {Playing | Exhausted}`, with `Cancelled`
//! reachable from `Selecting` and `Attempting`. Candidates are attempted one
//! at a time, in order. Only transport failures touch the health ledger.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::readiness::missing_hints;
use super::{AttemptRecord, AttemptResult, PlaybackError, PlaybackTransport, SessionState};
use crate::catalog::{EntryKey, SourceRef, Variant};
use crate::health::VariantHealthLedger;
use crate::metrics;

/// Cancels a running playback session. Cloneable; safe to call from any task.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<watch::Sender<bool>>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }
}

/// One playback session over a fixed, ordered candidate list.
pub struct PlaybackSession {
    id: Uuid,
    entry_key: EntryKey,
    state: SessionState,
    candidates: VecDeque<Variant>,
    attempts: Vec<AttemptRecord>,
    active: Option<Variant>,
    health: Arc<VariantHealthLedger>,
    transport: Arc<dyn PlaybackTransport>,
    cancel: watch::Receiver<bool>,
}

impl PlaybackSession {
    pub fn new(
        entry_key: EntryKey,
        candidates: Vec<Variant>,
        health: Arc<VariantHealthLedger>,
        transport: Arc<dyn PlaybackTransport>,
    ) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        let session = Self {
            id: Uuid::new_v4(),
            entry_key,
            state: SessionState::Selecting,
            candidates: candidates.into(),
            attempts: Vec::new(),
            active: None,
            health,
            transport,
            cancel: rx,
        };
        (session, CancelHandle(Arc::new(tx)))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn entry_key(&self) -> &EntryKey {
        &self.entry_key
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The variant currently playing, for display.
    pub fn active_source(&self) -> Option<&SourceRef> {
        self.active.as_ref().map(|v| &v.source_ref)
    }

    pub fn attempts(&self) -> &[AttemptRecord] {
        &self.attempts
    }

    /// Candidates not yet attempted, in order.
    pub fn remaining(&self) -> impl Iterator<Item = &SourceRef> {
        self.candidates.iter().map(|v| &v.source_ref)
    }

    /// Leave `Selecting` and attempt candidates until one plays.
    pub async fn start(&mut self) -> Result<SourceRef, PlaybackError> {
        if self.state != SessionState::Selecting {
            return Err(PlaybackError::InvalidState {
                state: self.state,
                operation: "start",
            });
        }
        if *self.cancel.borrow() {
            return Err(self.finish_cancelled());
        }
        if self.candidates.is_empty() {
            return Err(self.finish_exhausted());
        }

        self.state = SessionState::Attempting;
        self.attempt_remaining().await
    }

    /// The transport reported a mid-stream failure of the playing variant.
    ///
    /// Records the failure and continues with the remaining candidates; the
    /// list is not rebuilt.
    pub async fn report_stall(&mut self, reason: &str) -> Result<SourceRef, PlaybackError> {
        if self.state != SessionState::Playing {
            return Err(PlaybackError::InvalidState {
                state: self.state,
                operation: "report a stall",
            });
        }
        let Some(stalled) = self.active.take() else {
            return Err(PlaybackError::InvalidState {
                state: self.state,
                operation: "report a stall",
            });
        };

        warn!(session = %self.id, source_ref = %stalled.source_ref, reason, "Playing variant stalled");
        self.health.record_failure(&stalled.source_ref);
        self.attempts.push(AttemptRecord {
            source_ref: stalled.source_ref,
            result: AttemptResult::Failed {
                reason: reason.to_string(),
            },
        });

        self.state = SessionState::Attempting;
        self.attempt_remaining().await
    }

    async fn attempt_remaining(&mut self) -> Result<SourceRef, PlaybackError> {
        let transport = Arc::clone(&self.transport);

        while let Some(candidate) = self.candidates.pop_front() {
            if *self.cancel.borrow() {
                self.candidates.push_front(candidate);
                return Err(self.finish_cancelled());
            }

            let missing = missing_hints(&candidate);
            if !missing.is_empty() {
                debug!(session = %self.id, source_ref = %candidate.source_ref, ?missing, "Skipping variant that is not ready");
                metrics::PLAYBACK_ATTEMPTS
                    .with_label_values(&["not_ready"])
                    .inc();
                self.attempts.push(AttemptRecord {
                    source_ref: candidate.source_ref,
                    result: AttemptResult::NotReady { missing },
                });
                continue;
            }

            debug!(session = %self.id, source_ref = %candidate.source_ref, "Attempting variant");
            let outcome = tokio::select! {
                biased;
                _ = cancelled(&mut self.cancel) => None,
                result = transport.start(&candidate) => Some(result),
            };

            match outcome {
                None => {
                    self.candidates.push_front(candidate);
                    return Err(self.finish_cancelled());
                }
                Some(Ok(())) => {
                    self.health.record_success(&candidate.source_ref);
                    metrics::PLAYBACK_ATTEMPTS
                        .with_label_values(&["success"])
                        .inc();
                    metrics::PLAYBACK_SESSIONS
                        .with_label_values(&["playing"])
                        .inc();
                    info!(
                        session = %self.id,
                        entry = %self.entry_key,
                        source_ref = %candidate.source_ref,
                        failed_before = self.attempts.len(),
                        "Playback started"
                    );
                    let source_ref = candidate.source_ref.clone();
                    self.active = Some(candidate);
                    self.state = SessionState::Playing;
                    return Ok(source_ref);
                }
                Some(Err(failure)) => {
                    debug!(session = %self.id, source_ref = %candidate.source_ref, %failure, "Variant failed, falling back");
                    self.health.record_failure(&candidate.source_ref);
                    metrics::PLAYBACK_ATTEMPTS
                        .with_label_values(&["failure"])
                        .inc();
                    self.attempts.push(AttemptRecord {
                        source_ref: candidate.source_ref,
                        result: AttemptResult::Failed {
                            reason: failure.reason,
                        },
                    });
                }
            }
        }

        Err(self.finish_exhausted())
    }

    fn finish_exhausted(&mut self) -> PlaybackError {
        self.state = SessionState::Exhausted;
        metrics::PLAYBACK_SESSIONS
            .with_label_values(&["exhausted"])
            .inc();
        warn!(
            session = %self.id,
            entry = %self.entry_key,
            attempts = self.attempts.len(),
            "No playable source"
        );
        PlaybackError::Exhausted {
            attempts: self.attempts.clone(),
        }
    }

    fn finish_cancelled(&mut self) -> PlaybackError {
        self.state = SessionState::Cancelled;
        metrics::PLAYBACK_SESSIONS
            .with_label_values(&["cancelled"])
            .inc();
        info!(session = %self.id, entry = %self.entry_key, "Playback cancelled");
        PlaybackError::Cancelled {
            attempts: self.attempts.clone(),
        }
    }
}

/// Resolves once the session is cancelled. Never resolves if the handle is gone.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HealthConfig;
    use crate::playback::TransportFailure;
    use crate::testing::{fixtures, MockTransport};
    use std::time::Duration;

    fn setup(ids: &[&str]) -> (Vec<Variant>, Arc<VariantHealthLedger>, Arc<MockTransport>) {
        let variants = ids.iter().map(|id| fixtures::variant(id)).collect();
        let health = Arc::new(VariantHealthLedger::new(HealthConfig::default()));
        (variants, health, Arc::new(MockTransport::new()))
    }

    fn key() -> EntryKey {
        "movie:heat:1995".parse().unwrap()
    }

    #[tokio::test]
    async fn test_first_candidate_plays() {
        let (variants, health, transport) = setup(&["chat:1", "chat:2"]);
        let (mut session, _cancel) = PlaybackSession::new(key(), variants, health, transport.clone());

        let playing = session.start().await.unwrap();

        assert_eq!(playing.to_string(), "chat:1");
        assert_eq!(session.state(), SessionState::Playing);
        assert_eq!(session.active_source(), Some(&playing));
        assert_eq!(transport.started().await.len(), 1);
    }

    #[tokio::test]
    async fn test_falls_back_and_records_failures() {
        let (variants, health, transport) = setup(&["chat:1", "chat:2", "chat:3"]);
        transport.fail("chat:1", "404").await;
        transport.fail("chat:2", "timeout").await;
        let (mut session, _cancel) =
            PlaybackSession::new(key(), variants, health.clone(), transport.clone());

        let playing = session.start().await.unwrap();

        assert_eq!(playing.to_string(), "chat:3");
        assert_eq!(session.attempts().len(), 2);
        assert_eq!(
            health.snapshot(&"chat:1".parse().unwrap()).unwrap().failure_count,
            1
        );
        assert_eq!(
            health.snapshot(&"chat:2".parse().unwrap()).unwrap().failure_count,
            1
        );
        assert!(health.snapshot(&"chat:3".parse().unwrap()).is_none());
    }

    #[tokio::test]
    async fn test_exhausted_reports_every_attempt() {
        let (variants, health, transport) = setup(&["chat:1", "chat:2"]);
        transport.fail("chat:1", "404").await;
        transport.fail("chat:2", "403").await;
        let (mut session, _cancel) = PlaybackSession::new(key(), variants, health, transport);

        let err = session.start().await.unwrap_err();

        assert_eq!(session.state(), SessionState::Exhausted);
        let reasons: Vec<_> = err
            .attempts()
            .iter()
            .map(|a| (a.source_ref.to_string(), a.result.clone()))
            .collect();
        assert_eq!(
            reasons,
            vec![
                (
                    "chat:1".to_string(),
                    AttemptResult::Failed {
                        reason: "404".to_string()
                    }
                ),
                (
                    "chat:2".to_string(),
                    AttemptResult::Failed {
                        reason: "403".to_string()
                    }
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_candidate_list_is_exhausted() {
        let (_, health, transport) = setup(&[]);
        let (mut session, _cancel) = PlaybackSession::new(key(), Vec::new(), health, transport);

        assert!(matches!(
            session.start().await,
            Err(PlaybackError::Exhausted { attempts }) if attempts.is_empty()
        ));
    }

    #[tokio::test]
    async fn test_not_ready_skipped_without_touching_ledger() {
        let (mut variants, health, transport) = setup(&["chat:1", "chat:2"]);
        variants[0].hints = crate::catalog::QualityHints::new();
        let (mut session, _cancel) =
            PlaybackSession::new(key(), variants, health.clone(), transport.clone());

        let playing = session.start().await.unwrap();

        assert_eq!(playing.to_string(), "chat:2");
        assert!(matches!(
            session.attempts()[0].result,
            AttemptResult::NotReady { .. }
        ));
        assert!(health.is_empty());
        assert_eq!(transport.started().await.len(), 1);
    }

    #[tokio::test]
    async fn test_stall_continues_with_remaining_candidates() {
        let (variants, health, transport) = setup(&["chat:1", "chat:2"]);
        let (mut session, _cancel) =
            PlaybackSession::new(key(), variants, health.clone(), transport.clone());

        session.start().await.unwrap();
        let next = session.report_stall("buffer underrun").await.unwrap();

        assert_eq!(next.to_string(), "chat:2");
        assert_eq!(
            health.snapshot(&"chat:1".parse().unwrap()).unwrap().failure_count,
            1
        );
        // chat:1 is never retried within the session.
        let started: Vec<String> = transport
            .started()
            .await
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(started, vec!["chat:1", "chat:2"]);
    }

    #[tokio::test]
    async fn test_stall_outside_playing_is_invalid() {
        let (variants, health, transport) = setup(&["chat:1"]);
        let (mut session, _cancel) = PlaybackSession::new(key(), variants, health, transport);
        assert!(matches!(
            session.report_stall("x").await,
            Err(PlaybackError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn test_start_twice_is_invalid() {
        let (variants, health, transport) = setup(&["chat:1"]);
        let (mut session, _cancel) = PlaybackSession::new(key(), variants, health, transport);
        session.start().await.unwrap();
        assert!(matches!(
            session.start().await,
            Err(PlaybackError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let (variants, health, transport) = setup(&["chat:1"]);
        let (mut session, cancel) =
            PlaybackSession::new(key(), variants, health.clone(), transport.clone());

        cancel.cancel();
        assert!(matches!(
            session.start().await,
            Err(PlaybackError::Cancelled { .. })
        ));
        assert_eq!(session.state(), SessionState::Cancelled);
        assert!(transport.started().await.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_during_attempt_records_no_failure() {
        let (variants, health, transport) = setup(&["chat:1", "chat:2"]);
        transport.set_delay(Duration::from_secs(30)).await;
        let (mut session, cancel) =
            PlaybackSession::new(key(), variants, health.clone(), transport.clone());

        let task = tokio::spawn(async move {
            let result = session.start().await;
            (result, session.state())
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let (result, state) = task.await.unwrap();
        assert!(matches!(result, Err(PlaybackError::Cancelled { .. })));
        assert_eq!(state, SessionState::Cancelled);
        assert!(health.is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_type() {
        let failure = TransportFailure::new("gone");
        assert_eq!(failure.to_string(), "transport failure: gone");
    }
}
