//! The `{ok:true,...}` / `{ok:false,error,detail?}` response envelope shared
//! by every handler.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use crate::error::RagError;

/// Wraps [`RagError`] so handlers can return it directly via `?` and get the
/// right status code and envelope shape.
pub struct ApiError(pub RagError);

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = json!({
            "ok": false,
            "error": self.0.tag(),
            "detail": self.0.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

/// Wraps a successful payload as `{ok:true, ...fields}`.
pub fn ok<T: Serialize>(value: T) -> Response {
    let mut body = serde_json::to_value(value).unwrap_or_else(|_| json!({}));
    if let Some(map) = body.as_object_mut() {
        map.insert("ok".to_string(), json!(true));
    } else {
        body = json!({ "ok": true, "data": body });
    }
    Json(body).into_response()
}
