//! HTTP-facing error type, mirroring `cloudide_broker::error`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cloudide_core::{CoreError, ErrorKind};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl RunnerError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Core(e) => e.kind,
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

impl IntoResponse for RunnerError {
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

pub type RunnerResult<T> = Result<T, RunnerError>;
