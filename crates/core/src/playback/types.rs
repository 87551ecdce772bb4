//! Types for playback orchestration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::SourceRef;

/// Failure reported by the external transport for one attempt.
///
/// Timeouts are the transport's business and arrive here as failures too.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transport failure: {reason}")]
pub struct TransportFailure {
    pub reason: String,
}

impl TransportFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Caller-reported result of a playback attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
}

/// Session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Selecting,
    Attempting,
    Playing,
    Exhausted,
    Cancelled,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Selecting => "selecting",
            SessionState::Attempting => "attempting",
            SessionState::Playing => "playing",
            SessionState::Exhausted => "exhausted",
            SessionState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Exhausted | SessionState::Cancelled)
    }
}

/// Why a candidate did not end up playing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AttemptResult {
    /// The transport failed to start (or later stalled) the stream.
    Failed { reason: String },
    /// Required hints were missing; the transport was never asked.
    NotReady { missing: Vec<String> },
}

/// One candidate the session went through without success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub source_ref: SourceRef,
    #[serde(flatten)]
    pub result: AttemptResult,
}

/// Errors surfaced by a playback session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("no playable source after {} attempts", .attempts.len())]
    Exhausted { attempts: Vec<AttemptRecord> },

    #[error("playback cancelled after {} attempts", .attempts.len())]
    Cancelled { attempts: Vec<AttemptRecord> },

    #[error("cannot {operation} while {}", .state.as_str())]
    InvalidState {
        state: SessionState,
        operation: &'static str,
    },
}

impl PlaybackError {
    /// Attempts made before the session ended, if it ended.
    pub fn attempts(&self) -> &[AttemptRecord] {
        match self {
            PlaybackError::Exhausted { attempts } | PlaybackError::Cancelled { attempts } => {
                attempts
            }
            PlaybackError::InvalidState { .. } => &[],
        }
    }
}
