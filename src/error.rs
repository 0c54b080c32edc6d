use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Failed to store upload: {0}")]
    Storage(String),

    #[error("{message}")]
    Invocation {
        message: String,
        /// Whatever the engine produced before failing, for logs only
        output: Option<String>,
    },

    #[error("Failed to decode OCR output: {0}")]
    Decode(String),

    #[error("Missing file in request")]
    MissingFile,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Image too large (max: {max} bytes)")]
    ImageTooLarge { max: usize },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    pub fn invocation(message: impl Into<String>) -> Self {
        RelayError::Invocation {
            message: message.into(),
            output: None,
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        // Storage and request errors get a generic message so paths never leak
        let (status, code, message) = match &self {
            RelayError::Storage(_) => (
                StatusCode::BAD_REQUEST,
                "STORAGE_ERROR",
                "Failed to process image".to_string(),
            ),
            RelayError::InvalidRequest(_) => (
                StatusCode::BAD_REQUEST,
                "INVALID_REQUEST",
                "Failed to process image".to_string(),
            ),
            RelayError::MissingFile => (
                StatusCode::BAD_REQUEST,
                "MISSING_FILE",
                "No file provided".to_string(),
            ),
            RelayError::ImageTooLarge { .. } => {
                (StatusCode::PAYLOAD_TOO_LARGE, "IMAGE_TOO_LARGE", self.to_string())
            }
            RelayError::Invocation { .. } => {
                (StatusCode::BAD_GATEWAY, "INVOCATION_ERROR", self.to_string())
            }
            RelayError::Decode(_) => (StatusCode::BAD_GATEWAY, "DECODE_ERROR", self.to_string()),
            RelayError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal error".to_string(),
            ),
        };

        tracing::warn!(code, status = %status, "Request failed: {}", self);

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
