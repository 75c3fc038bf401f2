//! Windows key-state source backed by `GetAsyncKeyState`.
//!
//! # Safety
//!
//! This module uses `unsafe` code exclusively for Windows API FFI calls.
//! All `unsafe` blocks are annotated with `// SAFETY:` comments.

#![cfg(target_os = "windows")]

use keyrelay_core::detector::KeyStateError;
use keyrelay_core::{KeyCode, KeyStateSource};
use windows::Win32::UI::Input::KeyboardAndMouse::GetAsyncKeyState;

/// Queries the global asynchronous key state for each virtual-key code.
///
/// Bit 15 of the returned value is set while the key is down, which is the
/// bit the edge detector tests.  The "pressed since last call" bit 0 is
/// ignored.
#[derive(Debug, Default)]
pub struct WindowsKeyState;

impl WindowsKeyState {
    pub fn new() -> Self {
        Self
    }
}

impl KeyStateSource for WindowsKeyState {
    fn key_state(&mut self, code: KeyCode) -> Result<u16, KeyStateError> {
        // SAFETY: GetAsyncKeyState takes a plain integer and has no memory
        // preconditions; unknown codes simply report "up".
        let state = unsafe { GetAsyncKeyState(i32::from(code.0)) };
        Ok(state as u16)
    }
}
