//! Event dispatch: what the server does with each decoded event.
//!
//! Sessions run concurrently, so a handler may be invoked from several tasks
//! at once.  Calls for a single session are sequential and in wire order;
//! calls from different sessions interleave in no particular order.

use std::net::SocketAddr;

use keyrelay_core::{KeyEvent, ProtocolError};
use tracing::warn;

/// Receives every event decoded by any session.
///
/// Handlers run on the session's task.  A slow handler delays further reads
/// from that session only.
pub trait EventHandler: Send + Sync + 'static {
    /// Called once per successfully decoded event.
    fn on_event(&self, peer: SocketAddr, event: KeyEvent);

    /// Called for a line that could not be decoded.  The session keeps
    /// running afterwards.
    fn on_malformed(&self, peer: SocketAddr, error: &ProtocolError) {
        warn!("dropping malformed line from {peer}: {error}");
    }
}

impl<F> EventHandler for F
where
    F: Fn(SocketAddr, KeyEvent) + Send + Sync + 'static,
{
    fn on_event(&self, peer: SocketAddr, event: KeyEvent) {
        self(peer, event);
    }
}

/// Default handler: prints one human-readable line per event to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleHandler;

impl EventHandler for ConsoleHandler {
    fn on_event(&self, _peer: SocketAddr, event: KeyEvent) {
        println!("{}", format_console_line(&event));
    }
}

/// Formats `event` the way [`ConsoleHandler`] prints it: modifiers joined
/// with `+` in priority order, then key and state, e.g. `Ctrl+Shift+A pressed`.
/// Without modifiers this is just `A pressed`.
pub fn format_console_line(event: &KeyEvent) -> String {
    event.to_string()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
