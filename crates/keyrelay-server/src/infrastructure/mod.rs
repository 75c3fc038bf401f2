//! Infrastructure layer for the server.
//!
//! - [`network`]: TCP listener, accept loop, per-connection sessions.
//! - [`storage`]: `server.toml` configuration.

pub mod network;
pub mod storage;

pub use network::{ServerError, ServerOptions, ServerState, StreamingServer};
