//! `/api/tasks*` and `/api/documents/{id}/generate-embeddings` handlers.

use axum::extract::{Path, State};
use axum::response::Response;
use serde_json::json;

use crate::error::RagError;

use super::envelope::{ok, ApiError};
use super::AppState;

pub async fn generate_embeddings(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response, ApiError> {
    state
        .store
        .get_document(&id)
        .await?
        .ok_or_else(|| RagError::NotFound(id.clone()))?;
    let task = state.orchestrator.tasks().enqueue(&id).await;
    Ok(ok(task))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response, ApiError> {
    let task = state
        .orchestrator
        .tasks()
        .get_task(&id)
        .await
        .ok_or_else(|| RagError::NotFound(id.clone()))?;
    Ok(ok(task))
}

pub async fn list_for_document(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response, ApiError> {
    let tasks = state.orchestrator.tasks().tasks_for_document(&id).await;
    Ok(ok(json!({ "tasks": tasks })))
}
