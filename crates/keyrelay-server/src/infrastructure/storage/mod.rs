//! Persistent configuration for the server.

pub mod config;

pub use config::{load_server_config, ServerConfig};
