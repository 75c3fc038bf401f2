//! Platform key-state sources.
//!
//! Only Windows exposes a global "is this key down" query that works without
//! elevated privileges, so [`platform_key_state`] fails elsewhere.  Tests use
//! the scripted sources from `keyrelay_core::detector::mock` instead.

use keyrelay_core::KeyStateSource;
use thiserror::Error;

#[cfg(target_os = "windows")]
pub mod windows;

/// Error type for key-state source setup.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("platform not supported: {0}")]
    UnsupportedPlatform(String),
}

/// Returns the native key-state source for the current platform.
///
/// # Errors
///
/// Returns [`CaptureError::UnsupportedPlatform`] on anything but Windows.
pub fn platform_key_state() -> Result<Box<dyn KeyStateSource + Send>, CaptureError> {
    #[cfg(target_os = "windows")]
    {
        Ok(Box::new(windows::WindowsKeyState::new()))
    }

    #[cfg(not(target_os = "windows"))]
    {
        Err(CaptureError::UnsupportedPlatform(format!(
            "global key state polling is not available on {}",
            std::env::consts::OS
        )))
    }
}
