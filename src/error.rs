use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Failures of the generative-text endpoint
#[derive(thiserror::Error, Debug)]
pub enum LlmError {
    #[error("LLM API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("LLM network error: {0}")]
    Network(String),

    #[error("LLM request timed out")]
    Timeout,

    #[error("LLM request could not be sent: {0}")]
    Request(String),

    #[error("Failed to decode LLM response: {0}")]
    Decode(String),
}

impl LlmError {
    /// Terminal HTTP status, when the failure carried one
    pub fn status(&self) -> Option<u16> {
        match self {
            LlmError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Upstream capacity problems: 5xx, 429 and exhausted network failures
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Status { status, .. } => *status == 429 || (500..600).contains(status),
            LlmError::Network(_) | LlmError::Timeout => true,
            LlmError::Request(_) | LlmError::Decode(_) => false,
        }
    }
}

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            AppError::ExternalApi(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::HttpClient(_) | AppError::Llm(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
