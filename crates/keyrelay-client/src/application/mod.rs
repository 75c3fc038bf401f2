//! Application layer for the client.
//!
//! **Dependency rule**: this layer depends on `keyrelay_core` only and must
//! not import from `infrastructure`.

pub mod console;

pub use console::ConsoleSink;
