//! Error vocabulary shared by the broker and the runner.
//!
//! Every failure in either tier is tagged with one of the closed
//! [`ErrorKind`] variants below. Each binary maps `ErrorKind` to its own
//! transport (HTTP status, WebSocket close code) rather than duplicating
//! the mapping here.

use thiserror::Error;

/// The closed set of error kinds a request can fail with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidPayload,
    InvalidId,
    Unauthorized,
    NotFound,
    Conflict,
    RateLimited,
    PathEscape,
    UpstreamFailed,
    ContainerError,
    UnsupportedLanguage,
}

impl ErrorKind {
    /// Stable string used in JSON error bodies and log fields.
    pub fn code(self) -> &'static str {
        match self {
            Self::InvalidPayload => "INVALID_PAYLOAD",
            Self::InvalidId => "INVALID_ID",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::RateLimited => "RATE_LIMITED",
            Self::PathEscape => "PATH_ESCAPE",
            Self::UpstreamFailed => "UPSTREAM_FAILED",
            Self::ContainerError => "CONTAINER_ERROR",
            Self::UnsupportedLanguage => "UNSUPPORTED_LANGUAGE",
        }
    }
}

/// Domain error carried across the crate boundary.
///
/// Display renders `{kind_code}: {message}` so that it reads sensibly in
/// logs without needing the caller to separately log the kind.
#[derive(Error, Debug)]
#[error("{}: {message}", kind.code())]
pub struct CoreError {
    pub kind: ErrorKind,
    pub message: String,
}

impl CoreError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_id(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidId, message)
    }

    pub fn path_escape(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PathEscape, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn container(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ContainerError, message)
    }

    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidPayload, message)
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
