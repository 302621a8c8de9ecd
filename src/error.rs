//! Error taxonomy for the ingestion and coordination engine.
//!
//! [`AnalysisError`] carries the comparison coordinator's structured failure
//! modes; [`ApiError`] is the only type wired to an HTTP status (via
//! [`actix_web::ResponseError`]) since it is the only error type that crosses
//! into the query surface. Internal errors are logged with `tracing` and never
//! leaked into a response body.

use actix_web::{http::StatusCode, HttpResponse};

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("missing snapshots: before_complete={before_complete} after_complete={after_complete}")]
    MissingSnapshot {
        before_complete: bool,
        after_complete: bool,
    },
    #[error("failed to stage snapshot for analysis: {0}")]
    ScratchWriteFailed(#[from] std::io::Error),
    #[error("actor mailbox error: {0}")]
    Mailbox(#[from] actix::MailboxError),
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

impl actix_web::ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let ApiError::Internal(detail) = self {
            tracing::error!(%detail, "internal error serving request");
        }
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": match self {
                ApiError::Internal(_) => "internal server error".to_string(),
                ApiError::BadRequest(m) | ApiError::NotFound(m) => m.clone(),
            }
        }))
    }
}

impl From<AnalysisError> for ApiError {
    fn from(e: AnalysisError) -> Self {
        match e {
            AnalysisError::MissingSnapshot { .. } => ApiError::BadRequest(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}
