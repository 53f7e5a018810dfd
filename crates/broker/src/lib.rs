//! Control-plane library: HTTP API, WebSocket gateway, and persistence for
//! CloudIDE workspaces. `main.rs` is a thin binary wrapper around this crate
//! so that integration tests can drive the real `axum::Router` in-process.

pub mod auth;
pub mod config;
pub mod error;
pub mod git_cli;
pub mod http;
pub mod rate_limit;
pub mod runner_client;
pub mod state;
pub mod store;
pub mod tasks;
pub mod ws;
