//! Canonical identity derivation.
//!
//! Keys are a best-effort, deterministic heuristic on (title, year, season,
//! episode). Same inputs always give the same key. When identity cannot be
//! derived (live streams, titles that are all noise) there is no key at all,
//! and callers must treat the record as a singleton.

mod noise;

pub use noise::{strip_noise, TitleSignals};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::catalog::{MediaKind, RawCatalogRecord};

/// Derived identity shared by every record of one logical title.
///
/// Forms: `movie:{slug}`, `movie:{slug}:{year}`, `episode:{slug}:S{ss}E{ee}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CanonicalKey(String);

impl CanonicalKey {
    pub fn movie(slug: &str, year: Option<u16>) -> Self {
        match year {
            Some(year) => Self(format!("movie:{}:{}", slug, year)),
            None => Self(format!("movie:{}", slug)),
        }
    }

    pub fn episode(slug: &str, season: u32, episode: u32) -> Self {
        Self(format!("episode:{}:S{:02}E{:02}", slug, season, episode))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn media_kind(&self) -> MediaKind {
        if self.0.starts_with("episode:") {
            MediaKind::Episode
        } else {
            MediaKind::Movie
        }
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CanonicalKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix("movie:")
            .or_else(|| s.strip_prefix("episode:"))
            .ok_or_else(|| format!("Invalid canonical key: {}", s))?;
        if rest.is_empty() || rest.starts_with(':') {
            return Err(format!("Invalid canonical key (empty slug): {}", s));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for CanonicalKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CanonicalKey> for String {
    fn from(value: CanonicalKey) -> Self {
        value.0
    }
}

/// Result of identifying a record.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub key: Option<CanonicalKey>,
    pub media_kind: MediaKind,
    /// Signals from the title, with year/season/episode resolved against the
    /// explicit values.
    pub signals: TitleSignals,
}

/// Derive the canonical key for a title and optional year/season/episode.
pub fn derive_key(
    title: &str,
    year: Option<u16>,
    season: Option<u32>,
    episode: Option<u32>,
) -> Option<CanonicalKey> {
    resolve(title, year, season, episode, false).key
}

/// Derive the canonical key for a producer record.
pub fn derive_key_for_record(record: &RawCatalogRecord) -> Option<CanonicalKey> {
    identify(record).key
}

/// Identify a record: key, media kind and title signals.
pub fn identify(record: &RawCatalogRecord) -> Identity {
    let live = record.live || record.quality_hints.is_live();
    resolve(
        record.title.as_deref().unwrap_or_default(),
        record.year,
        record.season,
        record.episode,
        live,
    )
}

fn resolve(
    title: &str,
    year: Option<u16>,
    season: Option<u32>,
    episode: Option<u32>,
    live: bool,
) -> Identity {
    let mut signals = strip_noise(title);
    signals.live |= live;
    signals.season = season.or(signals.season);
    signals.episode = episode.or(signals.episode);

    let mut year = year.or(signals.year);
    let mut words: Vec<&str> = signals.cleaned.split_whitespace().collect();
    if words.len() > 1 {
        let trailing = words.last().and_then(|w| {
            let w = w.trim_matches(|c: char| !c.is_ascii_digit());
            (w.len() == 4).then(|| w.parse::<u16>().ok()).flatten()
        });
        if let Some(trailing) = trailing.filter(|y| (1900..2100).contains(y)) {
            // A trailing year belongs to the title only when it contradicts
            // the known release year ("Blade Runner 2049", 2017).
            if year.is_none() || year == Some(trailing) {
                year = Some(trailing);
                words.pop();
            }
        }
    }
    let cleaned = words.join(" ");
    signals.year = year;

    let slug = slugify(&cleaned);
    let is_episode = signals.season.is_some() && signals.episode.is_some();
    let media_kind = if signals.live {
        MediaKind::Live
    } else if is_episode {
        MediaKind::Episode
    } else {
        MediaKind::Movie
    };

    let key = if signals.live || slug.is_empty() {
        None
    } else {
        match (signals.season, signals.episode) {
            (Some(season), Some(episode)) => Some(CanonicalKey::episode(&slug, season, episode)),
            _ => Some(CanonicalKey::movie(&slug, year)),
        }
    };

    signals.cleaned = cleaned;
    Identity {
        key,
        media_kind,
        signals,
    }
}

/// Turn a cleaned title into a slug: lowercase ASCII-folded words joined by '-'.
pub fn slugify(title: &str) -> String {
    let mut folded = String::with_capacity(title.len());
    for c in title.chars().flat_map(char::to_lowercase) {
        match c {
            '\'' | '\u{2019}' | '`' => {}
            '&' => folded.push_str(" and "),
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => folded.push('a'),
            'è' | 'é' | 'ê' | 'ë' => folded.push('e'),
            'ì' | 'í' | 'î' | 'ï' => folded.push('i'),
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => folded.push('o'),
            'ù' | 'ú' | 'û' | 'ü' => folded.push('u'),
            'ñ' => folded.push('n'),
            'ç' => folded.push('c'),
            'ý' | 'ÿ' => folded.push('y'),
            'ß' => folded.push_str("ss"),
            'æ' => folded.push_str("ae"),
            'œ' => folded.push_str("oe"),
            c => folded.push(c),
        }
    }

    let mut slug = String::with_capacity(folded.len());
    for c in folded.chars() {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}
