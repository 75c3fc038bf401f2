//! Server configuration: `server.toml`.
//!
//! Every field has a serde default, so a partial file (or none at all)
//! yields a working configuration:
//!
//! ```toml
//! bind_address = "0.0.0.0"
//! port = 12345
//! backlog = 5
//! max_frame_len = 65536   # 0 disables the limit
//! read_buffer_len = 4096
//! log_level = "info"
//! ```

use std::net::{AddrParseError, IpAddr, SocketAddr};
use std::path::Path;

use keyrelay_core::config::{config_file_path, load_toml, ConfigError};
use keyrelay_core::protocol::DEFAULT_MAX_FRAME_LEN;
use serde::{Deserialize, Serialize};

use crate::infrastructure::network::server::{
    ServerOptions, DEFAULT_BACKLOG, DEFAULT_PORT, DEFAULT_READ_BUFFER_LEN,
};

/// File name of the server config inside the keyrelay config directory.
pub const SERVER_CONFIG_FILE: &str = "server.toml";

/// Settings read from `server.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// IP address to listen on.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_backlog")]
    pub backlog: u32,

    /// Longest accepted line in bytes.  `0` means unlimited.
    #[serde(default = "default_max_frame_len")]
    pub max_frame_len: usize,

    #[serde(default = "default_read_buffer_len")]
    pub read_buffer_len: usize,

    /// Fallback tracing filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_backlog() -> u32 {
    DEFAULT_BACKLOG
}

fn default_max_frame_len() -> usize {
    DEFAULT_MAX_FRAME_LEN
}

fn default_read_buffer_len() -> usize {
    DEFAULT_READ_BUFFER_LEN
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            backlog: default_backlog(),
            max_frame_len: default_max_frame_len(),
            read_buffer_len: default_read_buffer_len(),
            log_level: default_log_level(),
        }
    }
}

impl ServerConfig {
    /// Converts the file representation into listener options.
    ///
    /// # Errors
    ///
    /// Returns an error if `bind_address` is not an IP address literal.
    pub fn to_options(&self) -> Result<ServerOptions, AddrParseError> {
        let ip: IpAddr = self.bind_address.parse()?;
        Ok(ServerOptions {
            bind_addr: SocketAddr::new(ip, self.port),
            backlog: self.backlog,
            max_frame_len: (self.max_frame_len > 0).then_some(self.max_frame_len),
            read_buffer_len: self.read_buffer_len,
        })
    }
}

/// Loads the server config from `path`, or from the platform config
/// directory when `path` is `None`.
///
/// A missing file, or a platform without a config directory, yields
/// [`ServerConfig::default`].
///
/// # Errors
///
/// Returns [`ConfigError`] if the file exists but cannot be read or parsed.
pub fn load_server_config(path: Option<&Path>) -> Result<ServerConfig, ConfigError> {
    match path {
        Some(path) => load_toml(path),
        None => match config_file_path(SERVER_CONFIG_FILE) {
            Ok(path) => load_toml(&path),
            Err(ConfigError::NoPlatformConfigDir) => Ok(ServerConfig::default()),
            Err(e) => Err(e),
        },
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
