//! Container-plane library: sandboxed container lifecycle, shared-secret
//! HTTP API, preview proxy, and WebSocket terminators. `main.rs` is a thin
//! binary wrapper around this crate so that integration tests can drive the
//! real `axum::Router` in-process.

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod state;
pub mod supervisor;
pub mod ws;
