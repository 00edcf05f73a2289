use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use jobgate_engine::{SubmissionError, ValidationError};
use serde_json::{Value, json};
use tracing::{error, info};

/// Errors surfaced by the HTTP layer
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Submission(#[from] SubmissionError),

    /// Returns `400 Bad Request`
    #[error("{0}")]
    BadRequest(String),

    /// Returns `404 Not Found`
    #[error("{0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing listen address")]
    MissingListenAddress,

    #[error("Missing application state")]
    MissingState,

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ServerError>;

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Submission(e) if e.is_validation() => StatusCode::BAD_REQUEST,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// `errorMessage` payload: a list for aggregated rule failures, a single
    /// string otherwise.
    pub fn error_message(&self) -> Value {
        match self {
            Self::Submission(SubmissionError::Validation(ValidationError::Aggregated(messages))) => {
                json!(messages)
            }
            Self::Submission(SubmissionError::Validation(e)) => json!(e.to_string()),
            Self::BadRequest(msg) | Self::NotFound(msg) => json!(msg),
            Self::Submission(_) => json!("Internal Server Error"),
            other => json!(other.to_string()),
        }
    }

    pub fn body(&self) -> Value {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        } else {
            info!(status = status.as_u16(), error = %self, "request rejected");
        }
        json!({ "errorMessage": self.error_message() })
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
