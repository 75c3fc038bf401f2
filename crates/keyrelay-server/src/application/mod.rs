//! Application layer for the server.
//!
//! **Dependency rule**: this layer depends on `keyrelay_core` only and must
//! not import from `infrastructure`.

pub mod dispatch_events;
