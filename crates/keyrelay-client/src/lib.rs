//! keyrelay-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does keyrelay-client do?
//!
//! The client polls the state of every catalogued key, turns state changes
//! into press/release events, and streams them to a keyrelay server as
//! newline-delimited JSON.  With `--local` it prints the events instead of
//! sending them anywhere.

/// Application layer: local event consumers.
pub mod application;

/// Infrastructure layer: platform key state, TCP streaming, config storage.
pub mod infrastructure;
