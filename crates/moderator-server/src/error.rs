//! HTTP error responses

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Errors surfaced to API callers
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Malformed request body; inference was not attempted
    #[error("{0}")]
    InvalidRequest(String),

    /// Inference provider failed or returned unusable output
    #[error("{0}")]
    Inference(#[from] moderator_core::Error),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidRequest(_) => "invalid_request_error",
            AppError::Inference(e) if e.is_output_error() => "invalid_model_output",
            AppError::Inference(_) => "inference_error",
        }
    }

    /// Label for the errors counter
    pub fn metric_label(&self) -> &'static str {
        match self {
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::Inference(_) => "inference",
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "message": self.to_string(),
                "type": self.kind(),
            }
        });

        (self.status(), Json(body)).into_response()
    }
}
