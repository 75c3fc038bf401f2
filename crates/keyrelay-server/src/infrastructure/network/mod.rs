//! Network infrastructure: the listening server and its sessions.

pub mod server;
pub mod session;

pub use server::{ServerError, ServerOptions, ServerState, StreamingServer};
pub use session::{SessionEnd, SessionId, SessionRoster};
