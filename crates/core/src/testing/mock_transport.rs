//! Mock playback transport for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::catalog::{SourceRef, Variant};
use crate::playback::{PlaybackTransport, TransportFailure};

/// Mock implementation of the PlaybackTransport trait.
///
/// Every variant starts successfully unless scripted to fail. Starts are
/// recorded in order for assertions.
///
/// # Example
///
/// ```rust,ignore
/// let transport = MockTransport::new();
/// transport.fail("iptv:vod/1", "HTTP 404").await;
///
/// // ... run a session ...
///
/// assert_eq!(transport.started().await.len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct MockTransport {
    /// Failure reasons by source ref.
    failures: Arc<RwLock<HashMap<SourceRef, String>>>,
    /// Every start request, in order.
    started: Arc<RwLock<Vec<SourceRef>>>,
    /// Simulated time to open a stream.
    delay: Arc<RwLock<Option<Duration>>>,
}

impl MockTransport {
    /// Create a transport where everything plays.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a variant fail with the given reason.
    pub async fn fail(&self, source_ref: &str, reason: &str) {
        let source_ref: SourceRef = source_ref.parse().expect("valid source ref");
        self.failures
            .write()
            .await
            .insert(source_ref, reason.to_string());
    }

    /// Make a previously failing variant play again.
    pub async fn recover(&self, source_ref: &str) {
        let source_ref: SourceRef = source_ref.parse().expect("valid source ref");
        self.failures.write().await.remove(&source_ref);
    }

    /// Delay every start by the given duration.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    /// Source refs the transport was asked to start, in order.
    pub async fn started(&self) -> Vec<SourceRef> {
        self.started.read().await.clone()
    }
}

#[async_trait]
impl PlaybackTransport for MockTransport {
    async fn start(&self, variant: &Variant) -> Result<(), TransportFailure> {
        self.started
            .write()
            .await
            .push(variant.source_ref.clone());

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.failures.read().await.get(&variant.source_ref) {
            Some(reason) => Err(TransportFailure::new(reason.clone())),
            None => Ok(()),
        }
    }
}
