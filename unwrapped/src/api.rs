//! HTTP API
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `GET /health` | Liveness |
//! | `POST /analytics` | Report for `{"username": "...", "refresh": false}` |
//! | `GET /profiles/:name` | Stored channel profile image |

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use unwrapped_core::{AnalyticsService, Error, FsProfileStore, Report};

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AnalyticsService>,
    /// Where `/profiles/:name` reads from; `None` disables the route's content
    pub profiles: Option<FsProfileStore>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/analytics", post(analytics))
        .route("/profiles/:name", get(profile))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsRequest {
    pub username: String,
    #[serde(default)]
    pub refresh: bool,
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "health": "ok" }))
}

async fn analytics(
    State(state): State<AppState>,
    payload: Result<Json<AnalyticsRequest>, JsonRejection>,
) -> Result<Json<Report>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let report = state
        .service
        .report(&request.username, request.refresh)
        .await?;
    Ok(Json(report))
}

async fn profile(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let Some(store) = &state.profiles else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match store.load(&name).await {
        Ok(Some((bytes, content_type))) => {
            ([(header::CONTENT_TYPE, content_type)], bytes).into_response()
        }
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => ApiError::Engine(e).into_response(),
    }
}

/// Failure rendered as `{"error": "..."}` with a matching status
#[derive(Debug)]
pub enum ApiError {
    /// Request body could not be decoded
    BadRequest(String),
    Engine(Error),
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self::Engine(error)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        let ApiError::Engine(error) = self else {
            return StatusCode::BAD_REQUEST;
        };
        match error.root() {
            Error::InvalidUsername(_) => StatusCode::BAD_REQUEST,
            Error::ChannelNotFound(_) => StatusCode::NOT_FOUND,
            Error::NotAChannel(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::AuthFailed(_) => StatusCode::BAD_GATEWAY,
            _ if error.is_fetch_failure() => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Engine(error) => error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", message);
        } else {
            tracing::info!("Request rejected: {}", message);
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}
