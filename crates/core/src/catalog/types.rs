//! Types for the canonical catalog: producer records, variants and merged entries.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::QualityHints;
use crate::identity::{CanonicalKey, TitleSignals};

/// Originating system category of a record or variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Chat-based source (files posted in channels/groups).
    Chat,
    /// IPTV-style source (Xtream-like HTTP API).
    Iptv,
    Other,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Chat => "chat",
            SourceKind::Iptv => "iptv",
            SourceKind::Other => "other",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chat" | "telegram" => Ok(SourceKind::Chat),
            "iptv" | "xtream" => Ok(SourceKind::Iptv),
            "other" => Ok(SourceKind::Other),
            other => Err(format!("Unknown source kind: {}", other)),
        }
    }
}

/// Globally unique identity of a variant: `(source kind, source item id)`.
///
/// Renders as `kind:item_id`. Ordering is lexicographic on that form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourceRef {
    pub kind: SourceKind,
    pub item_id: String,
}

impl SourceRef {
    pub fn new(kind: SourceKind, item_id: impl Into<String>) -> Self {
        Self {
            kind,
            item_id: item_id.into(),
        }
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.item_id)
    }
}

impl FromStr for SourceRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, item_id) = s
            .split_once(':')
            .ok_or_else(|| format!("Invalid source ref (expected kind:id): {}", s))?;
        if item_id.is_empty() {
            return Err(format!("Invalid source ref (empty item id): {}", s));
        }
        Ok(SourceRef::new(kind.parse()?, item_id))
    }
}

impl TryFrom<String> for SourceRef {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SourceRef> for String {
    fn from(value: SourceRef) -> Self {
        value.to_string()
    }
}

fn default_true() -> bool {
    true
}

/// One producer's view of one source item. Immutable once emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCatalogRecord {
    pub source_kind: SourceKind,
    pub source_item_id: String,
    /// Raw, unnormalized title. Missing titles make the record malformed.
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub year: Option<u16>,
    #[serde(default)]
    pub season: Option<u32>,
    #[serde(default)]
    pub episode: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backdrop_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub quality_hints: QualityHints,
    /// Opaque handle the transport uses to open the stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playable_url_hint: Option<String>,
    /// Producer-reported availability.
    #[serde(default = "default_true")]
    pub available: bool,
    /// Producer signal for live/unbounded streams.
    #[serde(default)]
    pub live: bool,
    #[serde(default = "Utc::now")]
    pub discovered_at: DateTime<Utc>,
}

impl RawCatalogRecord {
    /// Create a record with only identity and title set.
    pub fn new(kind: SourceKind, item_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            source_kind: kind,
            source_item_id: item_id.into(),
            title: Some(title.into()),
            year: None,
            season: None,
            episode: None,
            poster_ref: None,
            backdrop_ref: None,
            duration_ms: None,
            genres: Vec::new(),
            quality_hints: QualityHints::new(),
            playable_url_hint: None,
            available: true,
            live: false,
            discovered_at: Utc::now(),
        }
    }

    pub fn source_ref(&self) -> SourceRef {
        SourceRef::new(self.source_kind, self.source_item_id.clone())
    }

    pub fn with_year(mut self, year: u16) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_episode(mut self, season: u32, episode: u32) -> Self {
        self.season = Some(season);
        self.episode = Some(episode);
        self
    }

    pub fn with_hints(mut self, hints: QualityHints) -> Self {
        self.quality_hints = hints;
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.playable_url_hint = Some(url.into());
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn live(mut self) -> Self {
        self.live = true;
        self
    }
}

/// Kind of media a canonical entry represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Movie,
    Episode,
    Live,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Episode => "episode",
            MediaKind::Live => "live",
        }
    }
}

/// One concrete playable instance of a canonical entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub source_ref: SourceRef,
    #[serde(default)]
    pub resolution_height: Option<u32>,
    /// `None` means unknown, which is never treated as a mismatch.
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub is_original_with_subtitles: bool,
    #[serde(default)]
    pub playable_url_hint: Option<String>,
    pub available: bool,
    #[serde(default)]
    pub hints: QualityHints,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    pub discovered_at: DateTime<Utc>,
}

impl Variant {
    /// Build a variant from a record. Explicit hints win over title-derived signals.
    pub fn from_record(record: &RawCatalogRecord, signals: &TitleSignals) -> Self {
        let hints = &record.quality_hints;
        Self {
            source_ref: record.source_ref(),
            resolution_height: hints.resolution_height().or(signals.resolution_height),
            language: hints.language().or_else(|| signals.language.clone()),
            is_original_with_subtitles: hints
                .original_with_subtitles()
                .unwrap_or(signals.original_with_subtitles),
            playable_url_hint: record
                .playable_url_hint
                .clone()
                .filter(|url| !url.trim().is_empty()),
            available: record.available,
            hints: hints.clone(),
            duration_ms: record.duration_ms,
            discovered_at: record.discovered_at,
        }
    }
}

/// Addressable key of a canonical entry.
///
/// Records with a derivable identity share a `Canonical` key; records without
/// one live alone under their own source ref and are never merged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EntryKey {
    Canonical(CanonicalKey),
    Source(SourceRef),
}

const SOURCE_KEY_PREFIX: &str = "source:";

impl EntryKey {
    pub fn for_record(key: Option<CanonicalKey>, record: &RawCatalogRecord) -> Self {
        match key {
            Some(key) => EntryKey::Canonical(key),
            None => EntryKey::Source(record.source_ref()),
        }
    }

    pub fn is_singleton(&self) -> bool {
        matches!(self, EntryKey::Source(_))
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKey::Canonical(key) => write!(f, "{}", key),
            EntryKey::Source(source_ref) => write!(f, "{}{}", SOURCE_KEY_PREFIX, source_ref),
        }
    }
}

impl FromStr for EntryKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix(SOURCE_KEY_PREFIX) {
            Some(rest) => Ok(EntryKey::Source(rest.parse()?)),
            None => Ok(EntryKey::Canonical(s.parse()?)),
        }
    }
}

impl TryFrom<String> for EntryKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EntryKey> for String {
    fn from(value: EntryKey) -> Self {
        value.to_string()
    }
}

/// The merged, addressable unit: one logical title across all sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEntry {
    pub key: EntryKey,
    pub title: String,
    #[serde(default)]
    pub year: Option<u16>,
    #[serde(default)]
    pub season: Option<u32>,
    #[serde(default)]
    pub episode: Option<u32>,
    pub media_kind: MediaKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backdrop_ref: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    /// Ranked variant list. Order is derived and recomputed on membership change.
    pub variants: Vec<Variant>,
    /// Scene noise carried by `title`; lower is cleaner.
    #[serde(default)]
    pub title_noise: usize,
    pub first_seen_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CanonicalEntry {
    /// Create an empty entry from the first record seen for its key.
    pub fn new(
        key: EntryKey,
        record: &RawCatalogRecord,
        signals: &TitleSignals,
        media_kind: MediaKind,
    ) -> Self {
        let now = Utc::now();
        Self {
            key,
            title: record.title.clone().unwrap_or_default().trim().to_string(),
            year: record.year.or(signals.year),
            season: record.season.or(signals.season),
            episode: record.episode.or(signals.episode),
            media_kind,
            poster_ref: record.poster_ref.clone(),
            backdrop_ref: record.backdrop_ref.clone(),
            genres: Vec::new(),
            variants: Vec::new(),
            title_noise: signals.noise_tokens,
            first_seen_at: now,
            updated_at: now,
        }
    }

    pub fn variant(&self, source_ref: &SourceRef) -> Option<&Variant> {
        self.variants.iter().find(|v| &v.source_ref == source_ref)
    }

    pub fn contains(&self, source_ref: &SourceRef) -> bool {
        self.variant(source_ref).is_some()
    }

    /// Insert or replace a variant by source ref. Returns true if it was new.
    pub fn upsert_variant(&mut self, variant: Variant) -> bool {
        self.updated_at = Utc::now();
        match self
            .variants
            .iter_mut()
            .find(|v| v.source_ref == variant.source_ref)
        {
            Some(existing) => {
                *existing = variant;
                false
            }
            None => {
                self.variants.push(variant);
                true
            }
        }
    }

    pub fn remove_variant(&mut self, source_ref: &SourceRef) -> Option<Variant> {
        let idx = self
            .variants
            .iter()
            .position(|v| &v.source_ref == source_ref)?;
        self.updated_at = Utc::now();
        Some(self.variants.remove(idx))
    }

    /// Fold descriptive metadata from another record into this entry.
    ///
    /// Missing images and years are filled in, genres are unioned in order,
    /// and the title switches only to a strictly cleaner one.
    pub fn absorb_metadata(&mut self, record: &RawCatalogRecord, signals: &TitleSignals) {
        if self.poster_ref.is_none() {
            self.poster_ref = record.poster_ref.clone();
        }
        if self.backdrop_ref.is_none() {
            self.backdrop_ref = record.backdrop_ref.clone();
        }
        if self.year.is_none() {
            self.year = record.year.or(signals.year);
        }
        for genre in &record.genres {
            let genre = genre.trim();
            if !genre.is_empty() && !self.genres.iter().any(|g| g.eq_ignore_ascii_case(genre)) {
                self.genres.push(genre.to_string());
            }
        }
        if let Some(title) = record.title.as_deref().map(str::trim) {
            if !title.is_empty() && (self.title.is_empty() || signals.noise_tokens < self.title_noise) {
                self.title = title.to_string();
                self.title_noise = signals.noise_tokens;
            }
        }
    }

    /// Number of variants currently reported available by their producer.
    pub fn available_count(&self) -> usize {
        self.variants.iter().filter(|v| v.available).count()
    }
}

/// Errors for catalog store operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Not found: {0}")]
    NotFound(String),
}
