//! Scene-release noise stripping.
//!
//! Release names look like `The.Matrix.1999.1080p.BluRay.x264-GRP.mkv` or
//! `DE: The Matrix (1999) [OmU]`. The stripper cuts the title at the first token
//! that marks the start of release metadata and harvests what it can from the
//! rest.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use crate::catalog::{normalize_language, parse_resolution};

static FILE_EXTENSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\.(mkv|mp4|avi|m4v|ts|webm|mov|wmv|flv|mpg|mpeg|m2ts)$").unwrap()
});
static DOTTED_CODEC: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bh\.(26[45])\b").unwrap());
static AUDIO_CHANNELS: Lazy<Regex> = Lazy::new(|| Regex::new(r"([57])\.1\b").unwrap());
static BRACKETED: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\[\(\{]([^\]\)\}]*)[\]\)\}]").unwrap());
static LANGUAGE_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:\|([A-Z]{2,3})\|\s*|([A-Z]{2,3})\s*(?::|\s-)\s+)").unwrap()
});
static EPISODE_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^s(\d{1,2})e(\d{1,3})$").unwrap());
static CROSS_EPISODE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})x(\d{2,3})$").unwrap());
static SEASON_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^s(\d{1,2})$").unwrap());
static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(19|20)\d{2}$").unwrap());
static RESOLUTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{3,4}[pi]|4k|8k|uhd|fhd)$").unwrap());

const CODEC_TOKENS: &[&str] = &[
    "x264", "x265", "h264", "h265", "hevc", "avc", "xvid", "divx", "av1", "vp9", "10bit", "8bit",
    "hdr", "hdr10", "dv", "sdr",
];
const SOURCE_TOKENS: &[&str] = &[
    "bluray", "bdrip", "brrip", "bdremux", "remux", "webrip", "webdl", "hdtv", "dvdrip",
    "dvd", "hdrip", "camrip", "cam", "telesync", "amzn", "nf", "dsnp", "hmax", "atvp", "proper",
    "repack",
];
const AUDIO_TOKENS: &[&str] = &[
    "aac", "ac3", "dts", "ddp", "dd51", "ddp51", "eac3", "truehd", "atmos", "flac", "mp3",
];
const OMU_TOKENS: &[&str] = &["omu", "omdu", "ovsub", "ov+sub", "omeu"];
/// Tokens that only count as noise once the cut has happened.
const TAIL_ONLY_TOKENS: &[&str] = &["dl", "dual", "multi", "51", "71", "subbed", "dubbed"];
const LANGUAGE_TOKENS: &[&str] = &[
    "german", "deutsch", "english", "french", "italian", "spanish", "ger", "eng", "ita", "fre",
    "spa",
];
const LANGUAGE_PREFIXES: &[&str] = &[
    "EN", "DE", "FR", "IT", "ES", "NL", "PL", "TR", "PT", "RU", "AR", "JA", "ENG", "GER", "DEU",
    "FRE", "ITA", "SPA",
];

/// What the stripper recovered from a raw title.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TitleSignals {
    /// Title with noise removed, original casing, single-spaced.
    pub cleaned: String,
    pub year: Option<u16>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub resolution_height: Option<u32>,
    pub original_with_subtitles: bool,
    pub language: Option<String>,
    /// The title marks a live or unbounded stream.
    pub live: bool,
    /// Number of noise fragments removed. Zero for a clean title.
    pub noise_tokens: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Word,
    Year(u16),
    Episode(u32, u32),
    Season(u32),
    Resolution(u32),
    Omu,
    Noise,
    TailOnly,
    Language,
}

fn classify(raw: &str) -> Token {
    let token = raw
        .trim_matches(|c: char| matches!(c, ',' | ';' | '!' | '?'))
        .to_lowercase();

    if let Some(caps) = EPISODE_MARKER
        .captures(&token)
        .or_else(|| CROSS_EPISODE_MARKER.captures(&token))
    {
        if let (Ok(s), Ok(e)) = (caps[1].parse(), caps[2].parse()) {
            return Token::Episode(s, e);
        }
    }
    if let Some(caps) = SEASON_MARKER.captures(&token) {
        if let Ok(s) = caps[1].parse() {
            return Token::Season(s);
        }
    }
    if YEAR.is_match(&token) {
        if let Ok(year) = token.parse() {
            return Token::Year(year);
        }
    }
    if RESOLUTION.is_match(&token) {
        if let Some(height) = parse_resolution(&token) {
            return Token::Resolution(height);
        }
    }
    if OMU_TOKENS.contains(&token.as_str()) {
        return Token::Omu;
    }
    if TAIL_ONLY_TOKENS.contains(&token.as_str()) {
        return Token::TailOnly;
    }
    if LANGUAGE_TOKENS.contains(&token.as_str()) {
        return Token::Language;
    }

    // "WEB-DL", "x264-GRP": any noisy part makes the whole token noise.
    let compound = token.contains('-');
    let noisy = token.split('-').any(|part| {
        (compound && part == "web")
            || CODEC_TOKENS.contains(&part)
            || SOURCE_TOKENS.contains(&part)
            || AUDIO_TOKENS.contains(&part)
            || RESOLUTION.is_match(part)
    });
    if noisy {
        Token::Noise
    } else {
        Token::Word
    }
}

fn starts_release_tail(token: Token) -> bool {
    matches!(
        token,
        Token::Episode(..) | Token::Season(_) | Token::Resolution(_) | Token::Omu | Token::Noise
    )
}

/// Whether the title announces a live or round-the-clock stream.
fn has_live_marker(title: &str) -> bool {
    let lower = title.trim().to_lowercase();
    lower.starts_with("live:") || lower.contains("[live]") || lower.contains("24/7")
}

/// Strip scene-release noise from a raw title and collect embedded signals.
pub fn strip_noise(title: &str) -> TitleSignals {
    let mut signals = TitleSignals {
        live: has_live_marker(title),
        ..TitleSignals::default()
    };

    let mut text = title.trim().to_string();
    if signals.live {
        if let Some(rest) = text.get(5..).filter(|_| text.to_lowercase().starts_with("live:")) {
            text = rest.trim().to_string();
        }
    }
    if FILE_EXTENSION.is_match(&text) {
        text = FILE_EXTENSION.replace(&text, "").into_owned();
        signals.noise_tokens += 1;
    }

    if let Some(caps) = LANGUAGE_PREFIX.captures(&text) {
        let code = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str());
        if let Some(code) = code.filter(|c| LANGUAGE_PREFIXES.contains(c)) {
            signals.language = normalize_language(code);
            signals.noise_tokens += 1;
            let end = caps.get(0).map(|m| m.end()).unwrap_or(0);
            text = text[end..].to_string();
        }
    }

    text = DOTTED_CODEC.replace_all(&text, "h$1").into_owned();
    text = AUDIO_CHANNELS.replace_all(&text, "${1}1").into_owned();

    let mut bracket_contents = Vec::new();
    for caps in BRACKETED.captures_iter(&text) {
        bracket_contents.push(caps[1].trim().to_string());
    }
    text = BRACKETED.replace_all(&text, " ").into_owned();
    for content in &bracket_contents {
        signals.noise_tokens += 1;
        absorb_bracket(content, &mut signals);
    }

    let text = text.replace(['.', '_'], " ");
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let kinds: Vec<Token> = tokens.iter().map(|t| classify(t)).collect();

    let cut = (1..tokens.len())
        .find(|&i| match kinds[i] {
            Token::Year(_) => kinds.get(i + 1).is_some_and(|next| {
                starts_release_tail(*next) || matches!(next, Token::TailOnly | Token::Language)
            }),
            kind => starts_release_tail(kind),
        })
        .unwrap_or(tokens.len());

    for kind in &kinds[cut..] {
        signals.noise_tokens += 1;
        match *kind {
            Token::Year(year) => {
                signals.year.get_or_insert(year);
            }
            Token::Episode(season, episode) => {
                signals.season.get_or_insert(season);
                signals.episode.get_or_insert(episode);
            }
            Token::Season(season) => {
                signals.season.get_or_insert(season);
            }
            Token::Resolution(height) => {
                signals.resolution_height.get_or_insert(height);
            }
            Token::Omu => signals.original_with_subtitles = true,
            _ => {}
        }
    }
    if signals.language.is_none() {
        signals.language = tokens[cut..]
            .iter()
            .zip(&kinds[cut..])
            .find(|(_, kind)| **kind == Token::Language)
            .and_then(|(token, _)| normalize_language(token));
    }

    signals.cleaned = tokens[..cut]
        .iter()
        .copied()
        .filter(|t| t.chars().any(char::is_alphanumeric))
        .collect::<Vec<_>>()
        .join(" ");
    signals
}

fn absorb_bracket(content: &str, signals: &mut TitleSignals) {
    let lower = content.to_lowercase();
    if YEAR.is_match(&lower) {
        if let Ok(year) = lower.parse() {
            signals.year.get_or_insert(year);
        }
        return;
    }
    if lower == "live" {
        signals.live = true;
        return;
    }
    for part in lower.split(|c: char| c.is_whitespace() || c == ',' || c == '/') {
        match classify(part) {
            Token::Omu => signals.original_with_subtitles = true,
            Token::Resolution(height) => {
                signals.resolution_height.get_or_insert(height);
            }
            Token::Language if signals.language.is_none() => {
                signals.language = normalize_language(part);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_release_name() {
        let s = strip_noise("The.Matrix.1999.1080p.BluRay.x264-GRP.mkv");
        assert_eq!(s.cleaned, "The Matrix");
        assert_eq!(s.year, Some(1999));
        assert_eq!(s.resolution_height, Some(1080));
        assert!(s.noise_tokens > 0);
    }

    #[test]
    fn test_clean_title_is_untouched() {
        let s = strip_noise("The Matrix");
        assert_eq!(s.cleaned, "The Matrix");
        assert_eq!(s.noise_tokens, 0);
        assert_eq!(s.year, None);
    }

    #[test]
    fn test_bracketed_tags_removed() {
        let s = strip_noise("[GRP] The Matrix (1999) [OmU]");
        assert_eq!(s.cleaned, "The Matrix");
        assert_eq!(s.year, Some(1999));
        assert!(s.original_with_subtitles);
    }

    #[test]
    fn test_episode_marker() {
        let s = strip_noise("Breaking.Bad.S01E02.720p.WEB-DL.mkv");
        assert_eq!(s.cleaned, "Breaking Bad");
        assert_eq!(s.season, Some(1));
        assert_eq!(s.episode, Some(2));
        assert_eq!(s.resolution_height, Some(720));
    }

    #[test]
    fn test_cross_episode_marker() {
        let s = strip_noise("Breaking Bad 1x02 Cat's in the Bag");
        assert_eq!(s.cleaned, "Breaking Bad");
        assert_eq!((s.season, s.episode), (Some(1), Some(2)));
    }

    #[test]
    fn test_leading_number_is_title() {
        let s = strip_noise("2001 A Space Odyssey 1968 2160p");
        assert_eq!(s.cleaned, "2001 A Space Odyssey");
        assert_eq!(s.year, Some(1968));
        assert_eq!(s.resolution_height, Some(2160));
    }

    #[test]
    fn test_trailing_year_stays_in_title() {
        let s = strip_noise("Blade Runner 2049");
        assert_eq!(s.cleaned, "Blade Runner 2049");
        assert_eq!(s.year, None);
    }

    #[test]
    fn test_tail_only_tokens_do_not_cut() {
        let s = strip_noise("Area.51.2015.German.DL.1080p");
        assert_eq!(s.cleaned, "Area 51");
        assert_eq!(s.year, Some(2015));
        assert_eq!(s.language.as_deref(), Some("de"));
    }

    #[test]
    fn test_language_prefix() {
        let s = strip_noise("DE: Der Untergang");
        assert_eq!(s.cleaned, "Der Untergang");
        assert_eq!(s.language.as_deref(), Some("de"));

        let s = strip_noise("|EN| The Office");
        assert_eq!(s.cleaned, "The Office");
        assert_eq!(s.language.as_deref(), Some("en"));
    }

    #[test]
    fn test_short_title_words_are_not_prefixes() {
        let s = strip_noise("UP: The Movie");
        assert_eq!(s.cleaned, "UP: The Movie");
        assert_eq!(s.language, None);
    }

    #[test]
    fn test_live_markers() {
        assert!(strip_noise("[LIVE] Sky Sports 1").live);
        assert!(strip_noise("LIVE: Champions League").live);
        assert!(strip_noise("Simpsons 24/7").live);
        assert!(!strip_noise("Live Free or Die Hard").live);
    }

    #[test]
    fn test_omu_token_cuts() {
        let s = strip_noise("Das Boot OmU 1981");
        assert_eq!(s.cleaned, "Das Boot");
        assert!(s.original_with_subtitles);
    }

    #[test]
    fn test_dotted_codec_and_channels() {
        let s = strip_noise("Heat.1995.DDP5.1.H.264-GRP");
        assert_eq!(s.cleaned, "Heat");
        assert_eq!(s.year, Some(1995));
    }
}
