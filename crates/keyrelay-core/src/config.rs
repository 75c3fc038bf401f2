//! TOML configuration file helpers shared by the client and server.
//!
//! Config files live in the platform-appropriate directory:
//! - Windows:  `%APPDATA%\keyrelay\<name>.toml`
//! - Linux:    `$XDG_CONFIG_HOME/keyrelay/<name>.toml` (or `~/.config/keyrelay`)
//! - macOS:    `~/Library/Application Support/keyrelay/<name>.toml`
//!
//! Config structs give every field a `#[serde(default = "...")]`, so a
//! missing file, or a file written by an older version, still loads.

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Determines the platform-appropriate directory for keyrelay config files.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the base directory cannot
/// be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves `<config dir>/<file_name>`.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path(file_name: &str) -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join(file_name))
}

/// Loads a config from `path`, returning `T::default()` if the file does not
/// exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_toml<T>(path: &Path) -> Result<T, ConfigError>
where
    T: DeserializeOwned + Default,
{
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_toml<T: Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("keyrelay"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("keyrelay"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("keyrelay")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Sample {
        #[serde(default)]
        port: u16,
        #[serde(default)]
        name: String,
    }

    fn temp_path(tag: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("keyrelay_cfg_{tag}_{}", std::process::id()))
            .join("sample.toml")
    }

    #[test]
    fn test_load_toml_returns_default_when_file_absent() {
        let path = PathBuf::from("/nonexistent/path/that/cannot/exist/sample.toml");
        let loaded: Sample = load_toml(&path).unwrap();
        assert_eq!(loaded, Sample::default());
    }

    #[test]
    fn test_save_then_load_round_trips() {
        // Arrange
        let path = temp_path("roundtrip");
        let original = Sample {
            port: 4242,
            name: "desk".to_string(),
        };

        // Act
        save_toml(&path, &original).unwrap();
        let loaded: Sample = load_toml(&path).unwrap();

        // Assert
        assert_eq!(loaded, original);

        // Cleanup
        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }

    #[test]
    fn test_load_toml_reports_parse_error() {
        let path = temp_path("bad");
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).unwrap();
        }
        std::fs::write(&path, "[[[ not valid toml").unwrap();

        let result: Result<Sample, _> = load_toml(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }

    #[test]
    fn test_config_file_path_ends_with_file_name() {
        if let Ok(path) = config_file_path("client.toml") {
            assert!(path.ends_with("keyrelay/client.toml"));
        }
        // NoPlatformConfigDir is acceptable in a stripped CI environment.
    }
}
