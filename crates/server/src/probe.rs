//! HTTP reachability probe.
//!
//! The server never streams media. This transport only checks that an HTTP
//! variant answers, which is enough to exercise fallback and feed the health
//! ledger from the server side.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use tracing::debug;

use reelmerge_core::{PlaybackTransport, TransportFailure, Variant};

/// Transport that issues a HEAD request (falling back to a one-byte ranged
/// GET when HEAD is refused) against a variant's URL hint.
pub struct HttpProbeTransport {
    client: Client,
}

impl HttpProbeTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("reelmerge/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Only plain HTTP(S) URLs can be probed.
    pub fn can_probe(variant: &Variant) -> bool {
        variant
            .playable_url_hint
            .as_deref()
            .map(|url| url.starts_with("http://") || url.starts_with("https://"))
            .unwrap_or(false)
    }
}

#[async_trait]
impl PlaybackTransport for HttpProbeTransport {
    async fn start(&self, variant: &Variant) -> Result<(), TransportFailure> {
        let url = variant
            .playable_url_hint
            .as_deref()
            .ok_or_else(|| TransportFailure::new("no playable url"))?;

        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| TransportFailure::new(e.to_string()))?;

        let status = if response.status() == StatusCode::METHOD_NOT_ALLOWED {
            debug!(source_ref = %variant.source_ref, "HEAD refused, retrying with ranged GET");
            self.client
                .get(url)
                .header(header::RANGE, "bytes=0-0")
                .send()
                .await
                .map_err(|e| TransportFailure::new(e.to_string()))?
                .status()
        } else {
            response.status()
        };

        if status.is_success() {
            Ok(())
        } else {
            Err(TransportFailure::new(format!("HTTP {}", status.as_u16())))
        }
    }
}
