//! Catalog API handlers: ingestion and entry lookup.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use futures::stream;
use serde::{Deserialize, Serialize};
use tracing::warn;

use reelmerge_core::{
    CanonicalEntry, EntryKey, IngestSummary, ProducerEvent, RawCatalogRecord, SourceKind,
    StreamReport, StreamTermination,
};

use super::{api_error, ApiError};
use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub records: Vec<RawCatalogRecord>,
}

/// A producer scan pass delivered in one request.
#[derive(Debug, Deserialize)]
pub struct PassRequest {
    #[serde(default)]
    pub records: Vec<RawCatalogRecord>,
    /// How the producer's pass ended.
    pub termination: StreamTermination,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    100
}

#[derive(Debug, Serialize)]
pub struct EntryListResponse {
    pub entries: Vec<CanonicalEntry>,
    pub total: usize,
}

pub(crate) fn parse_entry_key(raw: &str) -> Result<EntryKey, ApiError> {
    raw.parse()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Invalid entry key: {}", e)))
}

/// Look up an entry or answer 404.
pub(crate) async fn load_entry(
    state: &AppState,
    key: &EntryKey,
) -> Result<CanonicalEntry, ApiError> {
    match state.normalizer().entry(key).await {
        Ok(Some(entry)) => Ok(entry),
        Ok(None) => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Entry not found: {}", key),
        )),
        Err(e) => Err(api_error(StatusCode::SERVICE_UNAVAILABLE, e.to_string())),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/ingest
///
/// Merge a batch of raw records. Malformed records are counted, not fatal.
pub async fn ingest(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IngestRequest>,
) -> Json<IngestSummary> {
    Json(state.normalizer().ingest(request.records).await)
}

/// POST /api/v1/ingest/{kind}/pass
///
/// Replay a complete producer pass. A `completed` termination retires
/// variants of that kind the pass did not see.
pub async fn ingest_pass(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    Json(request): Json<PassRequest>,
) -> Result<Json<StreamReport>, ApiError> {
    let kind: SourceKind = kind
        .parse()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("{}", e)))?;

    if let Some(stray) = request.records.iter().find(|r| r.source_kind != kind) {
        warn!(%kind, stray = %stray.source_kind, "Rejecting pass with mixed source kinds");
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!(
                "Pass for {} contains a {} record",
                kind, stray.source_kind
            ),
        ));
    }

    let terminal = match request.termination {
        StreamTermination::Completed => ProducerEvent::Completed,
        StreamTermination::Cancelled => ProducerEvent::Cancelled,
        StreamTermination::Error(reason) => ProducerEvent::Error(reason),
    };
    let events = request
        .records
        .into_iter()
        .map(ProducerEvent::Record)
        .chain(std::iter::once(terminal));

    let report = state
        .normalizer()
        .ingest_stream(kind, stream::iter(events))
        .await;
    Ok(Json(report))
}

/// GET /api/v1/entries
pub async fn list_entries(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<EntryListResponse>, ApiError> {
    match state.normalizer().list_entries(params.limit).await {
        Ok(entries) => {
            let total = entries.len();
            Ok(Json(EntryListResponse { entries, total }))
        }
        Err(e) => Err(api_error(StatusCode::SERVICE_UNAVAILABLE, e.to_string())),
    }
}

/// GET /api/v1/entries/{key}
pub async fn get_entry(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<CanonicalEntry>, ApiError> {
    let key = parse_entry_key(&key)?;
    load_entry(&state, &key).await.map(Json)
}
