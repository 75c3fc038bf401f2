//! keyrelay-server library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does keyrelay-server do?
//!
//! The server is the listening side.  Any number of clients connect over
//! TCP and stream key events as newline-delimited JSON.  For every
//! connection the server:
//!
//! 1. Registers a session in its roster.
//! 2. Reads bytes, reassembles lines with a `LineFramer`, and decodes each
//!    line into a `KeyEvent`.
//! 3. Hands every event to an [`EventHandler`](application::dispatch_events::EventHandler)
//!    (by default, one console line per event).
//! 4. Removes the session and closes its socket when the peer disconnects,
//!    a read fails, or the server stops.

/// Application layer: where decoded events go.
pub mod application;

/// Infrastructure layer: TCP listener, sessions, and config storage.
pub mod infrastructure;
