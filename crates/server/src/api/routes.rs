use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{catalog, handlers, middleware::metrics_middleware, playback};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Ingestion
        .route("/ingest", post(catalog::ingest))
        .route("/ingest/{kind}/pass", post(catalog::ingest_pass))
        // Entries
        .route("/entries", get(catalog::list_entries))
        .route("/entries/{key}", get(catalog::get_entry))
        .route("/entries/{key}/candidates", get(playback::get_candidates))
        .route(
            "/entries/{key}/override",
            put(playback::set_override).delete(playback::clear_override),
        )
        .route("/entries/{key}/probe", post(playback::probe_entry))
        // Variant health
        .route("/outcomes", post(playback::report_outcome))
        .route(
            "/variants/{source_ref}/health",
            get(playback::get_variant_health).delete(playback::reset_variant_health),
        )
        .with_state(state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics).with_state(state))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
