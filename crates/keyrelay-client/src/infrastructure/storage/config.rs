//! Client configuration: `client.toml`.
//!
//! ```toml
//! host = "127.0.0.1"
//! port = 12345
//! poll_interval_ms = 10
//! channel_capacity = 256
//! log_level = "info"
//! ```

use std::path::Path;
use std::time::Duration;

use keyrelay_core::config::{config_file_path, load_toml, ConfigError};
use serde::{Deserialize, Serialize};

use crate::infrastructure::network::ClientOptions;

/// File name of the client config inside the keyrelay config directory.
pub const CLIENT_CONFIG_FILE: &str = "client.toml";

/// Settings read from `client.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server host name or IP address.
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Pause between two key-state polls, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Events buffered between the poll thread and the network writer.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Fallback tracing filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    12345
}

fn default_poll_interval_ms() -> u64 {
    10
}

fn default_channel_capacity() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            poll_interval_ms: default_poll_interval_ms(),
            channel_capacity: default_channel_capacity(),
            log_level: default_log_level(),
        }
    }
}

impl ClientConfig {
    /// Streaming options derived from this config, using the standard key
    /// catalog.
    pub fn to_options(&self) -> ClientOptions {
        ClientOptions {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            channel_capacity: self.channel_capacity,
            ..ClientOptions::default()
        }
    }
}

/// Loads the client config from `path`, or from the platform config
/// directory when `path` is `None`.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file exists but cannot be read or parsed.
pub fn load_client_config(path: Option<&Path>) -> Result<ClientConfig, ConfigError> {
    match path {
        Some(path) => load_toml(path),
        None => match config_file_path(CLIENT_CONFIG_FILE) {
            Ok(path) => load_toml(&path),
            Err(ConfigError::NoPlatformConfigDir) => Ok(ClientConfig::default()),
            Err(e) => Err(e),
        },
    }
}
