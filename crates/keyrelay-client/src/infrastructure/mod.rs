//! Infrastructure layer for the client.
//!
//! - [`key_state`]: the platform key-state query.
//! - [`network`]: the TCP connection and the event writer.
//! - [`storage`]: `client.toml` configuration.

pub mod key_state;
pub mod network;
pub mod storage;
