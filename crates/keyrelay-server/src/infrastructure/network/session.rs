//! Per-connection sessions and the shared session roster.
//!
//! A [`Session`] owns one accepted socket and a private [`LineFramer`].  It
//! reads until the peer closes, a read fails, or the server stops, and hands
//! every decoded event to the server's [`EventHandler`].
//!
//! The [`SessionRoster`] records every live session.  Admission, removal and
//! the full-roster close performed by `stop()` all take the same lock, so
//! none of them can observe another half-done.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex, MutexGuard, PoisonError,
};

use keyrelay_core::{decode_event, LineFramer};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::dispatch_events::EventHandler;

/// Identifier assigned to a session when it is admitted to the roster.
pub type SessionId = Uuid;

/// Why a session's read loop ended.
#[derive(Debug)]
pub enum SessionEnd {
    /// The peer closed its side (zero-byte read).
    PeerClosed,
    /// The server's running flag was cleared.
    Stopped,
    /// Reading from the socket failed.
    Transport(io::Error),
}

/// One accepted connection.
pub struct Session {
    id: SessionId,
    peer: SocketAddr,
    stream: TcpStream,
    framer: LineFramer,
    read_buffer_len: usize,
}

impl Session {
    pub fn new(
        id: SessionId,
        peer: SocketAddr,
        stream: TcpStream,
        max_frame_len: Option<usize>,
        read_buffer_len: usize,
    ) -> Self {
        Self {
            id,
            peer,
            stream,
            framer: LineFramer::with_max_frame_len(max_frame_len),
            read_buffer_len: read_buffer_len.max(1),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Reads and dispatches until the session ends.
    ///
    /// `running` is checked before every read.  A read already in progress
    /// is not interrupted by clearing it; `stop()` aborts the task instead.
    pub async fn run(&mut self, running: &AtomicBool, handler: &dyn EventHandler) -> SessionEnd {
        let mut buf = vec![0u8; self.read_buffer_len];

        loop {
            if !running.load(Ordering::SeqCst) {
                return SessionEnd::Stopped;
            }

            let n = match self.stream.read(&mut buf).await {
                Ok(0) => {
                    let rest = self.framer.take_remainder();
                    if !rest.is_empty() {
                        debug!(
                            "session {}: discarding {} bytes of unterminated input",
                            self.id,
                            rest.len()
                        );
                    }
                    return SessionEnd::PeerClosed;
                }
                Ok(n) => n,
                Err(e) => return SessionEnd::Transport(e),
            };

            for frame in self.framer.feed(&buf[..n]) {
                let line = match frame {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("session {} ({}): {e}", self.id, self.peer);
                        continue;
                    }
                };
                match decode_event(&line) {
                    Ok(event) => handler.on_event(self.peer, event),
                    Err(e) => handler.on_malformed(self.peer, &e),
                }
            }
        }
    }
}

struct SessionEntry {
    peer: SocketAddr,
    task: AbortHandle,
}

/// Mutex-guarded set of live sessions.
#[derive(Default)]
pub struct SessionRoster {
    sessions: Mutex<HashMap<SessionId, SessionEntry>>,
}

impl SessionRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits a new session unless `running` is already clear.
    ///
    /// The flag is checked and `spawn` is called while the roster lock is
    /// held, so a concurrent [`close_all`](Self::close_all) either sees the
    /// new entry or the session is never started.  Returns `None` when the
    /// server is no longer running; the caller then drops the connection.
    pub fn admit<F>(&self, running: &AtomicBool, peer: SocketAddr, spawn: F) -> Option<SessionId>
    where
        F: FnOnce(SessionId) -> JoinHandle<()>,
    {
        let mut sessions = self.lock();
        if !running.load(Ordering::SeqCst) {
            return None;
        }
        let id = Uuid::new_v4();
        let task = spawn(id).abort_handle();
        sessions.insert(id, SessionEntry { peer, task });
        Some(id)
    }

    /// Removes a session that ended on its own.  Tolerates an id that
    /// [`close_all`](Self::close_all) already removed.
    pub fn remove(&self, id: SessionId) -> bool {
        self.lock().remove(&id).is_some()
    }

    /// Aborts every session task and empties the roster.
    ///
    /// Aborting a task drops its socket, which closes the connection.
    /// Returns the number of sessions closed.
    pub fn close_all(&self) -> usize {
        let mut sessions = self.lock();
        let closed = sessions.len();
        for (id, entry) in sessions.drain() {
            debug!("closing session {id} ({})", entry.peer);
            entry.task.abort();
        }
        closed
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remote addresses of all live sessions, in no particular order.
    pub fn peers(&self) -> Vec<SocketAddr> {
        self.lock().values().map(|entry| entry.peer).collect()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, SessionEntry>> {
        // A panic while holding the lock cannot leave the map half-updated,
        // so the data is still usable after poisoning.
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Logs how a session ended.
pub(crate) fn log_session_end(id: SessionId, peer: SocketAddr, end: &SessionEnd) {
    match end {
        SessionEnd::PeerClosed => info!("client {peer} disconnected (session {id})"),
        SessionEnd::Stopped => debug!("session {id} ({peer}) stopped by server"),
        SessionEnd::Transport(e) => warn!("session {id} ({peer}) read failed: {e}"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
