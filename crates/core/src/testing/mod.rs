//! Testing utilities and mock implementations.
//!
//! This module provides mocks for the two external ports (catalog store and
//! playback transport), a manual clock for the health ledger, and fixtures.
//!
//! # Example
//!
//! ```rust,ignore
//! use reelmerge_core::testing::{fixtures, MockCatalogStore, MockTransport};
//!
//! let store = MockCatalogStore::new();
//! let transport = MockTransport::new();
//!
//! // Configure mock behavior
//! store.fail_upserts(true).await;
//! transport.fail("chat:1", "HTTP 404").await;
//!
//! // Use in Normalizer / PlaybackOrchestrator...
//! ```

mod clock;
mod mock_store;
mod mock_transport;

pub use clock::ManualClock;
pub use mock_store::MockCatalogStore;
pub use mock_transport::MockTransport;

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::{DateTime, Utc};

    use crate::catalog::{
        CanonicalEntry, EntryKey, HintKey, MediaKind, QualityHints, RawCatalogRecord, SourceKind,
        SourceRef, Variant,
    };

    fn epoch() -> DateTime<Utc> {
        DateTime::from_timestamp(1_704_067_200, 0).unwrap_or_default()
    }

    /// Hints that make a variant of any kind playback-ready.
    pub fn ready_hints() -> QualityHints {
        QualityHints::new()
            .with(HintKey::Container, "mkv")
            .with(HintKey::FileSize, "1073741824")
    }

    /// Create a chat-sourced record with ready hints.
    pub fn chat_record(item_id: &str, title: &str) -> RawCatalogRecord {
        RawCatalogRecord::new(SourceKind::Chat, item_id, title)
            .with_hints(ready_hints())
            .with_url(format!("tg://channel/42/{}", item_id))
    }

    /// Create an IPTV-sourced record with ready hints.
    pub fn iptv_record(item_id: &str, title: &str) -> RawCatalogRecord {
        RawCatalogRecord::new(SourceKind::Iptv, item_id, title)
            .with_hints(QualityHints::new().with(HintKey::Container, "mp4"))
            .with_url(format!("http://iptv.local/movie/{}.mp4", item_id))
    }

    /// Create a ready, available variant from a `kind:id` string.
    pub fn variant(source_ref: &str) -> Variant {
        let source_ref: SourceRef = source_ref.parse().expect("valid source ref");
        Variant {
            playable_url_hint: Some(format!("mock://{}", source_ref)),
            source_ref,
            resolution_height: None,
            language: None,
            is_original_with_subtitles: false,
            available: true,
            hints: ready_hints(),
            duration_ms: None,
            discovered_at: epoch(),
        }
    }

    /// Create a movie entry whose variants carry the given resolutions.
    pub fn entry_with_heights(variants: &[(&str, u32)]) -> CanonicalEntry {
        CanonicalEntry {
            key: EntryKey::Canonical(crate::identity::CanonicalKey::movie("fixture", Some(2000))),
            title: "Fixture".to_string(),
            year: Some(2000),
            season: None,
            episode: None,
            media_kind: MediaKind::Movie,
            poster_ref: None,
            backdrop_ref: None,
            genres: Vec::new(),
            variants: variants
                .iter()
                .map(|(id, height)| {
                    let mut v = variant(id);
                    v.resolution_height = Some(*height);
                    v
                })
                .collect(),
            title_noise: 0,
            first_seen_at: epoch(),
            updated_at: epoch(),
        }
    }
}
