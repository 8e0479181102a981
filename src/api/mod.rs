//! HTTP surface of the dev server.
//!
//! [`routes`] holds the resolution endpoint, [`modules`] serves the generated
//! module and [`sse`] carries reload signals to open pages.

pub mod modules;
pub mod routes;
pub mod sse;

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::AppState;
use crate::error::CacheError;

pub fn router() -> Router<AppState> {
    routes::build_router()
}

/// Errors returned by the HTTP API as `{"error": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Persistence(#[from] CacheError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
