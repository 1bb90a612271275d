//! `/api/chunks/search` and `/api/chunks/vector-search` handlers.

use axum::extract::{Query, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::search::hybrid_search;

use super::envelope::{ok, ApiError};
use super::AppState;

fn default_limit() -> usize {
    10
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

pub async fn hybrid(State(state): State<AppState>, Query(params): Query<SearchQuery>) -> Result<Response, ApiError> {
    let hits = hybrid_search(&state.store, state.embedder.as_ref(), &params.q, params.limit).await?;
    Ok(ok(json!({ "results": hits.into_iter().map(FusedHitJson::from).collect::<Vec<_>>() })))
}

#[derive(Debug, Deserialize)]
pub struct VectorSearchRequest {
    pub vector: Vec<f32>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

pub async fn vector_only(
    State(state): State<AppState>,
    Json(body): Json<VectorSearchRequest>,
) -> Result<Response, ApiError> {
    let hits = state.store.vector_search_chunks(&body.vector, body.limit).await?;
    let results: Vec<_> = hits
        .into_iter()
        .map(|(chunk, score)| json!({ "chunk": chunk, "score": score }))
        .collect();
    Ok(ok(json!({ "results": results })))
}

#[derive(serde::Serialize)]
struct FusedHitJson {
    chunk: crate::types::Chunk,
    score: f64,
    sources: Vec<&'static str>,
}

impl From<crate::search::FusedHit> for FusedHitJson {
    fn from(hit: crate::search::FusedHit) -> Self {
        let sources = hit
            .sources
            .iter()
            .map(|s| match s {
                crate::search::Source::Keyword => "keyword",
                crate::search::Source::Vector => "vector",
            })
            .collect();
        Self { chunk: hit.chunk, score: hit.score, sources }
    }
}
