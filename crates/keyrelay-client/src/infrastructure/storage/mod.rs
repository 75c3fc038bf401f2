//! Persistent configuration for the client.

pub mod config;

pub use config::{load_client_config, ClientConfig};
