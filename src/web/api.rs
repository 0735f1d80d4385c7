use crate::storage::{Invocation, Storer};
use crate::telemetry::MetricsRecorder;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

pub struct AppState {
    pub storer: Arc<dyn Storer>,
    pub recorder: Arc<dyn MetricsRecorder>,
}

/// GET /health
pub async fn health_check() -> &'static str {
    "OK"
}

/// GET /metrics
pub async fn metrics(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let text = state
        .recorder
        .render()
        .ok_or_else(|| ApiError::NotFound("metrics are not being recorded".to_string()))?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        text,
    )
        .into_response())
}

/// GET /collectors/:name/invocation
pub async fn get_invocation(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Invocation>, ApiError> {
    let invocation = state
        .storer
        .most_recent_invocation(&name)
        .await
        .map_err(|e| ApiError::InternalError(e.to_string()))?;

    invocation
        .map(Json)
        .ok_or_else(|| {
            ApiError::NotFound(format!("no invocation recorded for collector '{}'", name))
        })
}

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
