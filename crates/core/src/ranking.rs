//! Variant ranking.
//!
//! `rank` is a pure function of its inputs: the same variants, preferences and
//! health view always produce the same order, down to the final tie-break.

use serde::{Deserialize, Serialize};

use crate::catalog::{SourceKind, SourceRef, Variant};
use crate::config::RankingConfig;

/// Caller preferences applied while ordering variants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackPreferences {
    #[serde(default)]
    pub preferred_language: Option<String>,
    #[serde(default)]
    pub prefer_omu: bool,
    /// Source kind that wins ties after quality.
    #[serde(default)]
    pub preferred_source_kind: Option<SourceKind>,
}

impl PlaybackPreferences {
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.preferred_language = Some(language.into());
        self
    }

    pub fn with_omu(mut self) -> Self {
        self.prefer_omu = true;
        self
    }

    /// Prefer IPTV (Xtream) variants over other kinds at equal score.
    pub fn prefer_xtream(mut self) -> Self {
        self.preferred_source_kind = Some(SourceKind::Iptv);
        self
    }
}

impl From<&RankingConfig> for PlaybackPreferences {
    fn from(config: &RankingConfig) -> Self {
        Self {
            preferred_language: config.preferred_language.clone(),
            prefer_omu: config.prefer_omu,
            preferred_source_kind: config.preferred_source_kind,
        }
    }
}

/// Read-only view of variant health used during ranking.
pub trait HealthLookup: Send + Sync {
    fn is_permanently_dead(&self, source_ref: &SourceRef) -> bool;
}

/// Health view in which nothing is dead.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHealth;

impl HealthLookup for NoHealth {
    fn is_permanently_dead(&self, _source_ref: &SourceRef) -> bool {
        false
    }
}

/// Order variants best-first.
///
/// Cascade: usable (available and not dead), language match (unknown is
/// neutral, a different known language ranks below it), OmU when preferred,
/// resolution (missing is lowest), preferred source kind, then `SourceRef`.
/// Unusable variants are ordered last but never dropped.
pub fn rank(
    variants: &[Variant],
    prefs: &PlaybackPreferences,
    health: &dyn HealthLookup,
) -> Vec<Variant> {
    let preferred_language = prefs
        .preferred_language
        .as_deref()
        .and_then(crate::catalog::normalize_language);

    let mut scored: Vec<(Score, &Variant)> = variants
        .iter()
        .map(|v| (Score::of(v, prefs, preferred_language.as_deref(), health), v))
        .collect();

    scored.sort_by(|(a, va), (b, vb)| a.cmp(b).then_with(|| va.source_ref.cmp(&vb.source_ref)));
    scored.into_iter().map(|(_, v)| v.clone()).collect()
}

/// Sort key where smaller is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Score {
    unusable: bool,
    language: LanguageFit,
    not_omu: bool,
    resolution: std::cmp::Reverse<u32>,
    not_preferred_kind: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum LanguageFit {
    Match,
    Unknown,
    Other,
}

impl Score {
    fn of(
        variant: &Variant,
        prefs: &PlaybackPreferences,
        preferred_language: Option<&str>,
        health: &dyn HealthLookup,
    ) -> Self {
        let unusable = !variant.available || health.is_permanently_dead(&variant.source_ref);

        let language = match (preferred_language, variant.language.as_deref()) {
            (_, None) => LanguageFit::Unknown,
            (None, Some(_)) => LanguageFit::Unknown,
            (Some(wanted), Some(lang)) if wanted == lang => LanguageFit::Match,
            (Some(_), Some(_)) => LanguageFit::Other,
        };

        Self {
            unusable,
            language,
            not_omu: prefs.prefer_omu && !variant.is_original_with_subtitles,
            resolution: std::cmp::Reverse(variant.resolution_height.unwrap_or(0)),
            not_preferred_kind: prefs
                .preferred_source_kind
                .is_some_and(|kind| kind != variant.source_ref.kind),
        }
    }
}
