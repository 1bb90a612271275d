//! `/api/chunks*` and `/api/documents/{id}/chunks*` handlers.

use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::error::RagError;
use crate::types::Chunk;

use super::envelope::{ok, ApiError};
use super::AppState;

pub async fn list_for_document(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response, ApiError> {
    let chunks = state.store.get_chunks(&id).await?;
    Ok(ok(json!({ "chunks": chunks })))
}

pub async fn stats(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response, ApiError> {
    let stats = state.store.get_chunk_stats(&id).await?;
    Ok(ok(stats))
}

#[derive(Debug, Deserialize)]
pub struct AppendChunksRequest {
    pub chunks: Vec<Chunk>,
}

pub async fn append(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut body): Json<AppendChunksRequest>,
) -> Result<Response, ApiError> {
    for chunk in &mut body.chunks {
        chunk.document_id = id.clone();
    }
    let persisted = state.store.create_chunks(body.chunks).await?;
    Ok(ok(json!({ "chunks": persisted })))
}

/// Mirrors `GET /api/chunks` — every chunk across every shard. This is a
/// heavy endpoint; no pagination is implemented.
pub async fn all(State(state): State<AppState>) -> Result<Response, ApiError> {
    let chunks = state.store.all_chunks().await?;
    Ok(ok(json!({ "chunks": chunks })))
}

#[derive(Debug, Deserialize)]
pub struct SetEmbeddingRequest {
    pub embedding: Vec<f32>,
}

pub async fn set_embedding(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<SetEmbeddingRequest>,
) -> Result<Response, ApiError> {
    let found = state.store.update_chunk_embedding(&id, body.embedding).await?;
    if !found {
        return Err(RagError::NotFound(id).into());
    }
    Ok(ok(json!({ "updated": true })))
}
