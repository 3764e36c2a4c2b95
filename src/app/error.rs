use crate::utils::error::GameError;
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error(transparent)]
    Game(#[from] GameError),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::MalformedPayload(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::MalformedPayload(rejection.body_text())
    }
}

impl AppError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::MalformedPayload(_) => (StatusCode::BAD_REQUEST, "Invalid body".to_string()),
            AppError::Game(e) => {
                let status = match e {
                    GameError::ValidationError { .. } => StatusCode::BAD_REQUEST,
                    GameError::RoundNotFound { .. } => StatusCode::NOT_FOUND,
                    GameError::NoCandidate { .. } => StatusCode::SERVICE_UNAVAILABLE,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.user_friendly_message())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        if status.is_server_error() {
            match &self {
                AppError::Game(e) => tracing::error!(
                    "❌ Request failed: {} (Category: {:?}, Severity: {:?})",
                    e,
                    e.category(),
                    e.severity()
                ),
                other => tracing::error!("❌ Request failed: {}", other),
            }
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}
