//! API integration tests.
//!
//! These tests run the full router in-process against a temporary SQLite
//! store, with a scripted transport behind the probe endpoint.

mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};

use reelmerge_core::{config::HealthConfig, HintKey, RawCatalogRecord};

use common::{fixtures, TestFixture};

fn records(records: Vec<RawCatalogRecord>) -> Value {
    json!({ "records": records })
}

fn with_language(mut record: RawCatalogRecord, language: &str) -> RawCatalogRecord {
    record.quality_hints.insert(HintKey::Language, language);
    record
}

fn candidate_ids(body: &Value) -> Vec<String> {
    body["candidates"]
        .as_array()
        .expect("candidates array")
        .iter()
        .map(|c| c["source_ref"].as_str().unwrap_or_default().to_string())
        .collect()
}

/// Health config where a single failure kills a variant.
fn fragile() -> HealthConfig {
    HealthConfig {
        failure_threshold: 1,
        dead_after_hours: 0,
        ..Default::default()
    }
}

// =============================================================================
// Basic API Tests
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/health").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
    assert_eq!(response.body["config_hash"].as_str().unwrap().len(), 16);
    assert_eq!(response.body["entries"], 0);
}

#[tokio::test]
async fn test_config_endpoint() {
    let fixture = TestFixture::with_health(fragile()).await;
    let response = fixture.get("/api/v1/config").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["health"]["failure_threshold"], 1);
    assert_eq!(response.body["normalizer"]["batch_size"], 256);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new().await;
    fixture.get("/api/v1/health").await;

    let (status, text) = fixture.get_text("/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("reelmerge_http_requests_total"));
    assert!(text.contains("reelmerge_catalog_entries"));
}

// =============================================================================
// Ingestion Tests
// =============================================================================

#[tokio::test]
async fn test_ingest_merges_sources() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            "/api/v1/ingest",
            records(vec![
                fixtures::chat_record("100", "The.Matrix.1999.1080p.BluRay.x264-GRP.mkv"),
                fixtures::iptv_record("vod/7", "The Matrix").with_year(1999),
            ]),
        )
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["records_accepted"], 2);
    assert_eq!(response.body["entries_touched"], 1);

    let entry = fixture.get("/api/v1/entries/movie:the-matrix:1999").await;
    assert_status!(entry, StatusCode::OK);
    assert_eq!(entry.body["title"], "The Matrix");
    assert_eq!(entry.body["variants"].as_array().unwrap().len(), 2);

    let list = fixture.get("/api/v1/entries?limit=10").await;
    assert_status!(list, StatusCode::OK);
    assert_eq!(list.body["total"], 1);
}

#[tokio::test]
async fn test_ingest_counts_malformed_records() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            "/api/v1/ingest",
            json!({
                "records": [
                    { "source_kind": "chat", "source_item_id": "1" },
                    { "source_kind": "iptv", "source_item_id": "vod/1", "title": "Heat", "year": 1995 }
                ]
            }),
        )
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["records_rejected"], 1);
    assert_eq!(response.body["records_accepted"], 1);
}

#[tokio::test]
async fn test_ingest_rejects_invalid_json() {
    let fixture = TestFixture::new().await;
    let response = fixture.post_raw("/api/v1/ingest", "{not json").await;
    assert_status!(response, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_entry_lookup_errors() {
    let fixture = TestFixture::new().await;

    let missing = fixture.get("/api/v1/entries/movie:nothing-here:2000").await;
    assert_status!(missing, StatusCode::NOT_FOUND);

    let invalid = fixture.get("/api/v1/entries/not-a-key").await;
    assert_status!(invalid, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_completed_pass_retires_unseen_variants() {
    let fixture = TestFixture::new().await;
    fixture
        .post(
            "/api/v1/ingest",
            records(vec![
                fixtures::iptv_record("vod/1", "Heat").with_year(1995),
                fixtures::iptv_record("vod/2", "Alien").with_year(1979),
            ]),
        )
        .await;

    let response = fixture
        .post(
            "/api/v1/ingest/iptv/pass",
            json!({
                "records": [fixtures::iptv_record("vod/1", "Heat").with_year(1995)],
                "termination": { "status": "completed" }
            }),
        )
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["retired"], 1);
    assert_eq!(response.body["termination"]["status"], "completed");

    let alien = fixture.get("/api/v1/entries/movie:alien:1979").await;
    assert_eq!(alien.body["variants"][0]["available"], false);
}

#[tokio::test]
async fn test_errored_pass_retires_nothing() {
    let fixture = TestFixture::new().await;
    fixture
        .post(
            "/api/v1/ingest",
            records(vec![fixtures::iptv_record("vod/2", "Alien").with_year(1979)]),
        )
        .await;

    let response = fixture
        .post(
            "/api/v1/ingest/iptv/pass",
            json!({
                "records": [],
                "termination": { "status": "error", "reason": "HTTP 503" }
            }),
        )
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["retired"], 0);
    assert_eq!(response.body["termination"]["reason"], "HTTP 503");
}

#[tokio::test]
async fn test_pass_rejects_mixed_or_unknown_kinds() {
    let fixture = TestFixture::new().await;

    let mixed = fixture
        .post(
            "/api/v1/ingest/iptv/pass",
            json!({
                "records": [fixtures::chat_record("1", "Heat 1995")],
                "termination": { "status": "completed" }
            }),
        )
        .await;
    assert_status!(mixed, StatusCode::BAD_REQUEST);

    let unknown = fixture
        .post(
            "/api/v1/ingest/carrier-pigeon/pass",
            json!({ "termination": { "status": "completed" } }),
        )
        .await;
    assert_status!(unknown, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Candidate and Override Tests
// =============================================================================

async fn ingest_heat(fixture: &TestFixture) {
    let response = fixture
        .post(
            "/api/v1/ingest",
            records(vec![
                fixtures::chat_record("1", "Heat.1995.720p.HDTV"),
                fixtures::chat_record("2", "Heat.1995.1080p.WEB-DL"),
                fixtures::iptv_record("vod/1", "Heat").with_year(1995),
            ]),
        )
        .await;
    assert_status!(response, StatusCode::OK);
}

#[tokio::test]
async fn test_candidates_are_ranked() {
    let fixture = TestFixture::new().await;
    ingest_heat(&fixture).await;

    let response = fixture
        .get("/api/v1/entries/movie:heat:1995/candidates")
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(
        candidate_ids(&response.body),
        vec!["chat:2", "chat:1", "iptv:vod/1"]
    );
    assert_eq!(response.body["candidates"][0]["playback_ready"], true);
    assert!(response.body["override"].is_null());
}

#[tokio::test]
async fn test_candidates_honor_language_preference() {
    let fixture = TestFixture::new().await;
    fixture
        .post(
            "/api/v1/ingest",
            records(vec![
                with_language(fixtures::iptv_record("vod/fr", "Heat").with_year(1995), "fr"),
                fixtures::iptv_record("vod/none", "Heat").with_year(1995),
                with_language(fixtures::iptv_record("vod/en", "Heat").with_year(1995), "en"),
            ]),
        )
        .await;

    let response = fixture
        .get("/api/v1/entries/movie:heat:1995/candidates?language=en")
        .await;
    assert_eq!(
        candidate_ids(&response.body),
        vec!["iptv:vod/en", "iptv:vod/none", "iptv:vod/fr"]
    );
}

#[tokio::test]
async fn test_override_is_per_session() {
    let fixture = TestFixture::new().await;
    ingest_heat(&fixture).await;

    let pinned = fixture
        .put(
            "/api/v1/entries/movie:heat:1995/override",
            json!({ "session": "living-room", "source_ref": "iptv:vod/1" }),
        )
        .await;
    assert_status!(pinned, StatusCode::OK);
    assert!(pinned.body["previous"].is_null());

    let mine = fixture
        .get("/api/v1/entries/movie:heat:1995/candidates?session=living-room")
        .await;
    assert_eq!(mine.body["override"], "iptv:vod/1");
    assert_eq!(candidate_ids(&mine.body)[0], "iptv:vod/1");

    let theirs = fixture
        .get("/api/v1/entries/movie:heat:1995/candidates?session=bedroom")
        .await;
    assert_eq!(candidate_ids(&theirs.body)[0], "chat:2");

    let cleared = fixture
        .delete("/api/v1/entries/movie:heat:1995/override?session=living-room")
        .await;
    assert_status!(cleared, StatusCode::OK);
    assert_eq!(cleared.body["previous"], "iptv:vod/1");

    let after = fixture
        .get("/api/v1/entries/movie:heat:1995/candidates?session=living-room")
        .await;
    assert!(after.body["override"].is_null());
}

#[tokio::test]
async fn test_override_must_name_a_variant_of_the_entry() {
    let fixture = TestFixture::new().await;
    ingest_heat(&fixture).await;

    let response = fixture
        .put(
            "/api/v1/entries/movie:heat:1995/override",
            json!({ "session": "s", "source_ref": "iptv:vod/999" }),
        )
        .await;
    assert_status!(response, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Outcome and Health Tests
// =============================================================================

#[tokio::test]
async fn test_failure_outcome_demotes_variant() {
    let fixture = TestFixture::with_health(fragile()).await;
    ingest_heat(&fixture).await;

    let response = fixture
        .post(
            "/api/v1/outcomes",
            json!({ "source_ref": "chat:2", "outcome": "failure" }),
        )
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["transition"], "became_dead");
    assert_eq!(response.body["permanently_dead"], true);

    let candidates = fixture
        .get("/api/v1/entries/movie:heat:1995/candidates")
        .await;
    assert_eq!(
        candidate_ids(&candidates.body),
        vec!["chat:1", "iptv:vod/1", "chat:2"]
    );
    assert_eq!(candidates.body["candidates"][2]["permanently_dead"], true);
}

#[tokio::test]
async fn test_success_outcome_does_not_revive() {
    let fixture = TestFixture::with_health(fragile()).await;

    fixture
        .post(
            "/api/v1/outcomes",
            json!({ "source_ref": "iptv:vod/1", "outcome": "failure" }),
        )
        .await;
    let response = fixture
        .post(
            "/api/v1/outcomes",
            json!({ "source_ref": "iptv:vod/1", "outcome": "success" }),
        )
        .await;

    assert!(response.body["transition"].is_null());
    assert_eq!(response.body["permanently_dead"], true);
}

#[tokio::test]
async fn test_variant_health_lookup_and_reset() {
    let fixture = TestFixture::new().await;

    let missing = fixture.get("/api/v1/variants/iptv:vod%2F1/health").await;
    assert_status!(missing, StatusCode::NOT_FOUND);

    fixture
        .post(
            "/api/v1/outcomes",
            json!({ "source_ref": "iptv:vod/1", "outcome": "failure" }),
        )
        .await;

    let record = fixture.get("/api/v1/variants/iptv:vod%2F1/health").await;
    assert_status!(record, StatusCode::OK);
    assert_eq!(record.body["failure_count"], 1);
    assert_eq!(record.body["permanently_dead"], false);

    let reset = fixture.delete("/api/v1/variants/iptv:vod%2F1/health").await;
    assert_status!(reset, StatusCode::OK);
    assert_eq!(reset.body["reset"], true);
    assert!(fixture.health.is_empty());

    let invalid = fixture.get("/api/v1/variants/no-kind/health").await;
    assert_status!(invalid, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Probe Tests
// =============================================================================

#[tokio::test]
async fn test_probe_falls_back_and_skips_non_http_variants() {
    let fixture = TestFixture::new().await;
    fixture
        .post(
            "/api/v1/ingest",
            records(vec![
                fixtures::iptv_record("vod/1", "Heat.1995.1080p"),
                fixtures::iptv_record("vod/2", "Heat.1995.720p"),
                fixtures::chat_record("1", "Heat.1995.2160p.WEB-DL"),
            ]),
        )
        .await;
    fixture.transport.fail("iptv:vod/1", "HTTP 404").await;

    let response = fixture
        .post("/api/v1/entries/movie:heat:1995/probe", json!({}))
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["state"], "playing");
    assert_eq!(response.body["playing"], "iptv:vod/2");
    assert_eq!(response.body["attempts"].as_array().unwrap().len(), 1);
    assert_eq!(response.body["attempts"][0]["reason"], "HTTP 404");
    assert_eq!(response.body["skipped"], json!(["chat:1"]));

    assert_eq!(
        fixture
            .health
            .snapshot(&"iptv:vod/1".parse().unwrap())
            .unwrap()
            .failure_count,
        1
    );
}

#[tokio::test]
async fn test_probe_reports_exhaustion() {
    let fixture = TestFixture::new().await;
    fixture
        .post(
            "/api/v1/ingest",
            records(vec![fixtures::iptv_record("vod/1", "Heat").with_year(1995)]),
        )
        .await;
    fixture.transport.fail("iptv:vod/1", "timeout").await;

    let response = fixture
        .post("/api/v1/entries/movie:heat:1995/probe", json!({}))
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["state"], "exhausted");
    assert!(response.body["playing"].is_null());
}
