use crate::catalog::{HintKey, Variant};

/// Name reported when the variant has no playable URL hint.
pub const URL_HINT: &str = "playable_url_hint";

/// Required playback hints the variant lacks, by name.
pub fn missing_hints(variant: &Variant) -> Vec<String> {
    let mut missing = Vec::new();
    let has_url = variant
        .playable_url_hint
        .as_deref()
        .is_some_and(|url| !url.trim().is_empty());
    if !has_url {
        missing.push(URL_HINT.to_string());
    }
    for key in HintKey::required_for(variant.source_ref.kind) {
        if !variant.hints.contains(*key) {
            missing.push(key.as_str().to_string());
        }
    }
    missing
}

/// True only if every required playback hint is present.
pub fn is_playback_ready(variant: &Variant) -> bool {
    missing_hints(variant).is_empty()
}
