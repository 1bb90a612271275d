//! `/api/settings` handlers.

use axum::extract::State;
use axum::response::Response;
use axum::Json;

use crate::types::Settings;

use super::envelope::{ok, ApiError};
use super::AppState;

pub async fn get(State(state): State<AppState>) -> Result<Response, ApiError> {
    let settings = state.settings.read().await;
    Ok(ok(settings))
}

pub async fn update(
    State(state): State<AppState>,
    Json(body): Json<Settings>,
) -> Result<Response, ApiError> {
    let updated = state.settings.update(|s| *s = body.clone()).await?;
    Ok(ok(updated))
}
