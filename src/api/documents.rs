//! `/api/documents*` handlers.

use axum::extract::{Multipart, Path, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::error::RagError;
use crate::types::DocumentStatus;

use super::envelope::{ok, ApiError};
use super::AppState;

pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut filename: Option<String> = None;
    let mut user_id: Option<String> = None;
    let mut category: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| RagError::Validation(err.to_string()))?
    {
        match field.name().unwrap_or("") {
            "file" => {
                filename = field.file_name().map(|s| s.to_string());
                file_bytes = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|err| RagError::Validation(err.to_string()))?
                        .to_vec(),
                );
            }
            "userId" => {
                user_id = Some(field.text().await.map_err(|err| RagError::Validation(err.to_string()))?);
            }
            "category" => {
                category = Some(field.text().await.map_err(|err| RagError::Validation(err.to_string()))?);
            }
            _ => {}
        }
    }

    let filename = filename.ok_or_else(|| RagError::Validation("multipart field 'file' is required".into()))?;
    let bytes = file_bytes.ok_or_else(|| RagError::Validation("multipart field 'file' is required".into()))?;

    let document = state.orchestrator.ingest(&filename, bytes, category, user_id).await?;
    Ok(ok(document))
}

pub async fn list(State(state): State<AppState>) -> Result<Response, ApiError> {
    let documents = state.store.list_documents().await?;
    Ok(ok(json!({ "documents": documents })))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response, ApiError> {
    let document = state
        .store
        .get_document(&id)
        .await?
        .ok_or_else(|| RagError::NotFound(id.clone()))?;
    Ok(ok(document))
}

#[derive(Debug, Deserialize)]
pub struct UpdateDocumentRequest {
    pub category: Option<String>,
    pub status: Option<DocumentStatus>,
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateDocumentRequest>,
) -> Result<Response, ApiError> {
    let updated = state
        .store
        .update_document(&id, |d| {
            if let Some(category) = body.category {
                d.category = Some(category);
            }
            if let Some(status) = body.status {
                d.status = status;
            }
        })
        .await?
        .ok_or_else(|| RagError::NotFound(id.clone()))?;
    Ok(ok(updated))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response, ApiError> {
    let removed = state.store.delete_document(&id).await?;
    if !removed {
        return Err(RagError::NotFound(id).into());
    }
    Ok(ok(json!({ "deleted": true })))
}
