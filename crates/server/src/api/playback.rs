//! Playback API handlers: candidate lists, overrides, outcomes and health.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use reelmerge_core::{
    playback::{missing_hints, AttemptRecord, PlaybackSession},
    EntryKey, HealthTransition, Outcome, PlaybackPreferences, SessionState, SourceKind, SourceRef,
    Variant, VariantHealthRecord,
};

use super::catalog::{load_entry, parse_entry_key};
use super::{api_error, ApiError};
use crate::probe::HttpProbeTransport;
use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

/// Per-request preference overrides. Anything unset falls back to `[ranking]`.
#[derive(Debug, Default, Deserialize)]
pub struct PreferenceParams {
    #[serde(default)]
    pub session: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub omu: Option<bool>,
    #[serde(default)]
    pub prefer_kind: Option<SourceKind>,
}

impl PreferenceParams {
    fn resolve(&self, defaults: &PlaybackPreferences) -> PlaybackPreferences {
        PlaybackPreferences {
            preferred_language: self
                .language
                .clone()
                .or_else(|| defaults.preferred_language.clone()),
            prefer_omu: self.omu.unwrap_or(defaults.prefer_omu),
            preferred_source_kind: self.prefer_kind.or(defaults.preferred_source_kind),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CandidateView {
    #[serde(flatten)]
    pub variant: Variant,
    pub playback_ready: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_hints: Vec<String>,
    pub permanently_dead: bool,
}

#[derive(Debug, Serialize)]
pub struct CandidatesResponse {
    pub entry_key: EntryKey,
    #[serde(rename = "override")]
    pub manual_override: Option<SourceRef>,
    pub candidates: Vec<CandidateView>,
}

#[derive(Debug, Deserialize)]
pub struct SetOverrideRequest {
    pub session: String,
    pub source_ref: SourceRef,
}

#[derive(Debug, Deserialize)]
pub struct SessionParams {
    pub session: String,
}

#[derive(Debug, Serialize)]
pub struct OverrideResponse {
    pub entry_key: EntryKey,
    pub session: String,
    pub source_ref: Option<SourceRef>,
    pub previous: Option<SourceRef>,
}

#[derive(Debug, Deserialize)]
pub struct OutcomeRequest {
    pub source_ref: SourceRef,
    pub outcome: Outcome,
}

#[derive(Debug, Serialize)]
pub struct OutcomeResponse {
    pub source_ref: SourceRef,
    pub transition: Option<HealthTransition>,
    pub permanently_dead: bool,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub source_ref: SourceRef,
    pub reset: bool,
}

#[derive(Debug, Serialize)]
pub struct ProbeResponse {
    pub entry_key: EntryKey,
    pub state: SessionState,
    pub playing: Option<SourceRef>,
    pub attempts: Vec<AttemptRecord>,
    /// Candidates the probe cannot reach over HTTP.
    pub skipped: Vec<SourceRef>,
}

fn parse_source_ref(raw: &str) -> Result<SourceRef, ApiError> {
    raw.parse()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Invalid source ref: {}", e)))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/entries/{key}/candidates
///
/// Ordered fallback list for an entry, with the session's override first.
pub async fn get_candidates(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(params): Query<PreferenceParams>,
) -> Result<Json<CandidatesResponse>, ApiError> {
    let key = parse_entry_key(&key)?;
    let entry = load_entry(&state, &key).await?;
    let prefs = params.resolve(state.default_prefs());

    let manual_override = params
        .session
        .as_deref()
        .and_then(|session| state.overrides().get(session, &key));

    let candidates = state
        .orchestrator()
        .resolve_active_variant(&entry, manual_override.as_ref(), &prefs)
        .into_iter()
        .map(|variant| {
            let missing = missing_hints(&variant);
            CandidateView {
                playback_ready: missing.is_empty(),
                missing_hints: missing,
                permanently_dead: state.health().is_permanently_dead(&variant.source_ref),
                variant,
            }
        })
        .collect();

    Ok(Json(CandidatesResponse {
        entry_key: key,
        manual_override,
        candidates,
    }))
}

/// PUT /api/v1/entries/{key}/override
///
/// Pin one of the entry's variants for a session.
pub async fn set_override(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Json(request): Json<SetOverrideRequest>,
) -> Result<Json<OverrideResponse>, ApiError> {
    let key = parse_entry_key(&key)?;
    let entry = load_entry(&state, &key).await?;

    if !entry.contains(&request.source_ref) {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("Entry {} has no variant {}", key, request.source_ref),
        ));
    }

    let previous = state
        .overrides()
        .pin(&request.session, &key, request.source_ref.clone());
    info!(entry = %key, session = %request.session, source_ref = %request.source_ref, "Variant pinned");

    Ok(Json(OverrideResponse {
        entry_key: key,
        session: request.session,
        source_ref: Some(request.source_ref),
        previous,
    }))
}

/// DELETE /api/v1/entries/{key}/override?session=...
pub async fn clear_override(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(params): Query<SessionParams>,
) -> Result<Json<OverrideResponse>, ApiError> {
    let key = parse_entry_key(&key)?;
    let previous = state.overrides().clear(&params.session, &key);

    Ok(Json(OverrideResponse {
        entry_key: key,
        session: params.session,
        source_ref: None,
        previous,
    }))
}

/// POST /api/v1/entries/{key}/probe
///
/// Walk the entry's HTTP candidates through the reachability probe, falling
/// back past failures. Probe failures count against variant health.
pub async fn probe_entry(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(params): Query<PreferenceParams>,
) -> Result<Json<ProbeResponse>, ApiError> {
    let key = parse_entry_key(&key)?;
    let entry = load_entry(&state, &key).await?;
    let prefs = params.resolve(state.default_prefs());
    let manual_override = params
        .session
        .as_deref()
        .and_then(|session| state.overrides().get(session, &key));

    let (probeable, skipped): (Vec<Variant>, Vec<Variant>) = state
        .orchestrator()
        .resolve_active_variant(&entry, manual_override.as_ref(), &prefs)
        .into_iter()
        .partition(HttpProbeTransport::can_probe);

    let (mut session, _cancel) = PlaybackSession::new(
        key.clone(),
        probeable,
        Arc::clone(state.orchestrator().health()),
        Arc::clone(state.transport()),
    );
    let playing = session.start().await.ok();

    Ok(Json(ProbeResponse {
        entry_key: key,
        state: session.state(),
        playing,
        attempts: session.attempts().to_vec(),
        skipped: skipped.into_iter().map(|v| v.source_ref).collect(),
    }))
}

/// POST /api/v1/outcomes
///
/// Playback result observed by a client.
pub async fn report_outcome(
    State(state): State<Arc<AppState>>,
    Json(request): Json<OutcomeRequest>,
) -> Json<OutcomeResponse> {
    let transition = state
        .orchestrator()
        .report_outcome(&request.source_ref, request.outcome);

    Json(OutcomeResponse {
        permanently_dead: state.health().is_permanently_dead(&request.source_ref),
        source_ref: request.source_ref,
        transition,
    })
}

/// GET /api/v1/variants/{source_ref}/health
pub async fn get_variant_health(
    State(state): State<Arc<AppState>>,
    Path(source_ref): Path<String>,
) -> Result<Json<VariantHealthRecord>, ApiError> {
    let source_ref = parse_source_ref(&source_ref)?;
    state.health().snapshot(&source_ref).map(Json).ok_or_else(|| {
        api_error(
            StatusCode::NOT_FOUND,
            format!("No health record for {}", source_ref),
        )
    })
}

/// DELETE /api/v1/variants/{source_ref}/health
///
/// Forget a variant's failure history.
pub async fn reset_variant_health(
    State(state): State<Arc<AppState>>,
    Path(source_ref): Path<String>,
) -> Result<Json<ResetResponse>, ApiError> {
    let source_ref = parse_source_ref(&source_ref)?;
    let reset = state.health().reset(&source_ref);
    if reset {
        info!(%source_ref, "Variant health reset");
    }
    Ok(Json(ResetResponse { source_ref, reset }))
}
