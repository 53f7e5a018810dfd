//! Shared domain logic for the CloudIDE control plane.
//!
//! This crate holds everything that must behave identically on both sides of
//! the broker/runner trust boundary: path and workspace-id safety, the
//! AES-GCM credential cipher, the session JWT codec, the LSP Base Protocol
//! framer, the fuzzy/text search ranking, and the `docker` CLI process
//! wrapper used by the runner's container lifecycle.

pub mod docker;
pub mod errors;
pub mod ids;
pub mod jwt;
pub mod lsp_framing;
pub mod models;
pub mod path_safety;
pub mod redaction;
pub mod search;
pub mod secrets;

pub use errors::{CoreError, ErrorKind, Result};
