//! Playback variant orchestration.
//!
//! The orchestrator turns a canonical entry into an ordered candidate list and
//! walks it through the external transport, falling back past failures.

mod orchestrator;
mod overrides;
mod readiness;
mod session;
mod types;

pub use orchestrator::PlaybackOrchestrator;
pub use overrides::OverrideRegistry;
pub use readiness::{is_playback_ready, missing_hints};
pub use session::{CancelHandle, PlaybackSession};
pub use types::*;

use async_trait::async_trait;

use crate::catalog::Variant;

/// Port to the media transport that actually opens streams.
///
/// `Ok(())` means playback started. Any timeout policy belongs to the
/// implementation and must surface as a failure.
#[async_trait]
pub trait PlaybackTransport: Send + Sync {
    async fn start(&self, variant: &Variant) -> Result<(), TransportFailure>;
}
