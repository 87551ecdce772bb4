//! Quality hints reported by producers.
//!
//! Producers hand over free-form key/value bags. They are parsed into a closed
//! set of recognized keys here; anything else is dropped at the boundary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::SourceKind;

/// Recognized quality hint keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HintKey {
    /// Vertical resolution ("1080p", "1920x1080", "4k").
    Resolution,
    /// Audio language of the stream.
    Language,
    /// Container / file extension ("mkv", "mp4", "ts").
    Container,
    VideoCodec,
    AudioCodec,
    /// Subtitle languages, free text.
    Subtitles,
    /// Original audio with subtitles ("OmU").
    OriginalWithSubtitles,
    /// File size in bytes.
    FileSize,
    /// "live" for unbounded streams, anything else for on-demand.
    StreamKind,
}

const CHAT_REQUIRED: &[HintKey] = &[HintKey::Container, HintKey::FileSize];
const IPTV_REQUIRED: &[HintKey] = &[HintKey::Container];
const OTHER_REQUIRED: &[HintKey] = &[HintKey::Container];

impl HintKey {
    /// Canonical name used in serialized hint bags.
    pub fn as_str(&self) -> &'static str {
        match self {
            HintKey::Resolution => "resolution",
            HintKey::Language => "language",
            HintKey::Container => "container",
            HintKey::VideoCodec => "video_codec",
            HintKey::AudioCodec => "audio_codec",
            HintKey::Subtitles => "subtitles",
            HintKey::OriginalWithSubtitles => "original_with_subtitles",
            HintKey::FileSize => "file_size",
            HintKey::StreamKind => "stream_kind",
        }
    }

    /// Parse a producer key, accepting the aliases seen in the wild.
    pub fn parse(raw: &str) -> Option<Self> {
        let key = raw.trim().to_lowercase().replace(['-', ' '], "_");
        let parsed = match key.as_str() {
            "resolution" | "res" | "height" | "quality" => HintKey::Resolution,
            "language" | "lang" | "audio_language" => HintKey::Language,
            "container" | "container_extension" | "ext" | "extension" | "mime" | "mime_type"
            | "format" => HintKey::Container,
            "video_codec" | "vcodec" | "codec" => HintKey::VideoCodec,
            "audio_codec" | "acodec" => HintKey::AudioCodec,
            "subtitles" | "subs" | "subtitle_languages" => HintKey::Subtitles,
            "original_with_subtitles" | "omu" | "ov_sub" => HintKey::OriginalWithSubtitles,
            "file_size" | "size" | "size_bytes" => HintKey::FileSize,
            "stream_kind" | "stream_type" | "kind" => HintKey::StreamKind,
            _ => return None,
        };
        Some(parsed)
    }

    /// Hints a variant of the given source kind needs before playback can start.
    pub fn required_for(kind: SourceKind) -> &'static [HintKey] {
        match kind {
            SourceKind::Chat => CHAT_REQUIRED,
            SourceKind::Iptv => IPTV_REQUIRED,
            SourceKind::Other => OTHER_REQUIRED,
        }
    }
}

/// Parsed hint bag keyed by [`HintKey`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, String>",
    into = "BTreeMap<String, String>"
)]
pub struct QualityHints(BTreeMap<HintKey, String>);

impl QualityHints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a hint. Empty values remove the key.
    pub fn insert(&mut self, key: HintKey, value: impl Into<String>) {
        let value = value.into();
        let value = value.trim();
        if value.is_empty() {
            self.0.remove(&key);
        } else {
            self.0.insert(key, value.to_string());
        }
    }

    /// Insert a producer key/value pair. Returns false if the key is not recognized.
    pub fn insert_raw(&mut self, raw_key: &str, value: impl Into<String>) -> bool {
        match HintKey::parse(raw_key) {
            Some(key) => {
                self.insert(key, value);
                true
            }
            None => {
                tracing::debug!(key = raw_key, "Dropping unrecognized quality hint");
                false
            }
        }
    }

    pub fn with(mut self, key: HintKey, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: HintKey) -> Option<&str> {
        self.0.get(&key).map(String::as_str)
    }

    pub fn contains(&self, key: HintKey) -> bool {
        self.0.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (HintKey, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Resolution height, if the resolution hint can be parsed.
    pub fn resolution_height(&self) -> Option<u32> {
        self.get(HintKey::Resolution).and_then(parse_resolution)
    }

    /// Normalized language code. `None` means unknown.
    pub fn language(&self) -> Option<String> {
        self.get(HintKey::Language).and_then(normalize_language)
    }

    pub fn original_with_subtitles(&self) -> Option<bool> {
        self.get(HintKey::OriginalWithSubtitles).map(parse_flag)
    }

    pub fn is_live(&self) -> bool {
        self.get(HintKey::StreamKind)
            .map(|v| v.eq_ignore_ascii_case("live"))
            .unwrap_or(false)
    }
}

impl From<BTreeMap<String, String>> for QualityHints {
    fn from(raw: BTreeMap<String, String>) -> Self {
        let mut hints = QualityHints::new();
        for (key, value) in raw {
            hints.insert_raw(&key, value);
        }
        hints
    }
}

impl From<QualityHints> for BTreeMap<String, String> {
    fn from(hints: QualityHints) -> Self {
        hints
            .0
            .into_iter()
            .map(|(k, v)| (k.as_str().to_string(), v))
            .collect()
    }
}

/// Parse a resolution value into a vertical pixel height.
///
/// Accepts "1080p", "1080i", "1080", "1920x1080", "4k", "uhd", "fhd", "hd", "sd".
pub fn parse_resolution(value: &str) -> Option<u32> {
    let v = value.trim().to_lowercase();
    match v.as_str() {
        "4k" | "uhd" | "2160p" => return Some(2160),
        "8k" => return Some(4320),
        "fhd" | "fullhd" | "full hd" => return Some(1080),
        "hd" => return Some(720),
        "sd" => return Some(480),
        _ => {}
    }

    if let Some((_, height)) = v.split_once('x') {
        return height.trim().parse().ok().filter(|h| *h > 0);
    }

    let digits = v.trim_end_matches(['p', 'i']);
    digits.parse().ok().filter(|h| *h > 0)
}

/// Normalize a language value to a lowercase code.
///
/// Common English/native names map to their ISO 639-1 code. Unknown markers
/// ("und", "unknown", empty) return `None`.
pub fn normalize_language(value: &str) -> Option<String> {
    let v = value.trim().to_lowercase();
    let code = match v.as_str() {
        "" | "und" | "unknown" | "n/a" | "none" | "null" | "-" => return None,
        "english" | "eng" => "en",
        "german" | "deutsch" | "ger" | "deu" => "de",
        "french" | "francais" | "français" | "fre" | "fra" => "fr",
        "italian" | "italiano" | "ita" => "it",
        "spanish" | "espanol" | "español" | "spa" => "es",
        "dutch" | "nederlands" | "nld" | "dut" => "nl",
        "polish" | "polski" | "pol" => "pl",
        "turkish" | "turkce" | "türkçe" | "tur" => "tr",
        "portuguese" | "portugues" | "português" | "por" => "pt",
        "russian" | "rus" => "ru",
        "arabic" | "ara" => "ar",
        "japanese" | "jpn" => "ja",
        other => other,
    };
    Some(code.to_string())
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "1" | "yes" | "y" | "omu" | "omdu"
    )
}
