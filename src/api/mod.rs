//! Thin `axum` HTTP layer over the core ingestion/search engine.

mod chunks;
mod documents;
mod envelope;
mod search;
mod settings;
mod tasks;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::orchestrator::Orchestrator;
use crate::providers::EmbeddingProvider;
use crate::store::{FlatStore, ShardStore};
use crate::types::Settings;

pub use envelope::ApiError;

/// Shared state handed to every handler via `axum::extract::State`.
#[derive(Clone)]
pub struct AppState {
    pub store: ShardStore,
    pub orchestrator: Orchestrator,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub settings: FlatStore<Settings>,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config, store: ShardStore, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        let orchestrator = Orchestrator::new(store.clone(), embedder.clone());
        let settings = FlatStore::new(config.data_dir.join("settings.json"));
        Self { store, orchestrator, embedder, settings, config }
    }
}

/// Builds the full router, wired with request tracing and the payload size
/// limits.
pub fn router(state: AppState) -> Router {
    let json_limit = state.config.json_limit_bytes;
    let multipart_limit = state.config.multipart_limit_bytes;

    let upload_routes = Router::new()
        .route("/api/documents/upload", post(documents::upload))
        .layer(RequestBodyLimitLayer::new(multipart_limit));

    let json_routes = Router::new()
        .route("/api/documents", get(documents::list))
        .route(
            "/api/documents/{id}",
            get(documents::get).put(documents::update).delete(documents::delete),
        )
        .route("/api/documents/{id}/chunks", get(chunks::list_for_document).post(chunks::append))
        .route("/api/documents/{id}/chunk-stats", get(chunks::stats))
        .route("/api/documents/{id}/generate-embeddings", post(tasks::generate_embeddings))
        .route("/api/documents/{id}/tasks", get(tasks::list_for_document))
        .route("/api/tasks/{id}", get(tasks::get))
        .route("/api/chunks", get(chunks::all))
        .route("/api/chunks/search", get(search::hybrid))
        .route("/api/chunks/vector-search", post(search::vector_only))
        .route("/api/chunks/{id}/embedding", put(chunks::set_embedding))
        .route("/api/settings", get(settings::get).put(settings::update))
        .layer(RequestBodyLimitLayer::new(json_limit));

    upload_routes
        .merge(json_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
