//! HTTP-facing error type.
//!
//! Wraps [`cloudide_core::CoreError`] plus the broker's own failure modes
//! and maps every variant onto a status code and JSON body once, at the
//! `IntoResponse` boundary, rather than scattering `StatusCode` literals
//! through the handlers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cloudide_core::{CoreError, ErrorKind};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("upstream runner request failed: {0}")]
    Runner(#[from] reqwest::Error),
}

impl BrokerError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Core(e) => e.kind,
            Self::Database(_) => ErrorKind::UpstreamFailed,
            Self::Runner(_) => ErrorKind::UpstreamFailed,
        }
    }

    fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::InvalidPayload | ErrorKind::InvalidId | ErrorKind::UnsupportedLanguage => {
                StatusCode::BAD_REQUEST
            }
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::PathEscape => StatusCode::BAD_REQUEST,
            ErrorKind::UpstreamFailed => StatusCode::BAD_GATEWAY,
            ErrorKind::ContainerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for BrokerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.kind().code();
        tracing::warn!(error = %self, code, "request failed");
        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        }));
        (status, body).into_response()
    }
}

pub type BrokerResult<T> = Result<T, BrokerError>;
