//! TCP listener, accept loop, and server lifecycle.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──start()──▶ Listening ──stop()──▶ Stopped
//!   │                                       ▲
//!   └──────────── bind failure ─────────────┘
//! ```
//!
//! `Stopped` is terminal.  A stopped server refuses `start()` with
//! [`ServerError::NotRestartable`]; build a new [`StreamingServer`] instead.
//!
//! # Tasks
//!
//! `start()` binds synchronously, then spawns the accept loop as its own
//! Tokio task and returns.  The accept loop spawns one task per connection
//! and never waits on a session.  `stop()` aborts every session task, which
//! drops (and so closes) its socket, then aborts the accept loop, which
//! drops the listener.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};
use std::time::Duration;

use keyrelay_core::protocol::DEFAULT_MAX_FRAME_LEN;
use thiserror::Error;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::application::dispatch_events::{ConsoleHandler, EventHandler};
use crate::infrastructure::network::session::{log_session_end, Session, SessionRoster};

/// Port used when none is configured.
pub const DEFAULT_PORT: u16 = 12345;

/// Default listen backlog.
pub const DEFAULT_BACKLOG: u32 = 5;

/// Default size of each session's socket read buffer.
pub const DEFAULT_READ_BUFFER_LEN: usize = 4096;

/// Pause after a failed `accept()` before trying again.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(50);

// ── Errors and state ──────────────────────────────────────────────────────────

/// Errors returned by [`StreamingServer::start`].
#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding or listening failed.  The server is now `Stopped`.
    #[error("failed to listen on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("server is already listening")]
    AlreadyStarted,

    #[error("server has been stopped and cannot be restarted")]
    NotRestartable,
}

/// Lifecycle state of a [`StreamingServer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Idle,
    Listening,
    Stopped,
}

/// Listener and session parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    pub bind_addr: SocketAddr,
    pub backlog: u32,
    /// Longest accepted line, excluding the delimiter.  `None` disables the
    /// limit.
    pub max_frame_len: Option<usize>,
    pub read_buffer_len: usize,
}

impl ServerOptions {
    /// Default options listening on `bind_addr`.
    pub fn bind(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Self::default()
        }
    }
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            backlog: DEFAULT_BACKLOG,
            max_frame_len: Some(DEFAULT_MAX_FRAME_LEN),
            read_buffer_len: DEFAULT_READ_BUFFER_LEN,
        }
    }
}

// ── Server ────────────────────────────────────────────────────────────────────

/// State shared between the server handle, the accept loop and sessions.
struct Shared {
    running: AtomicBool,
    roster: SessionRoster,
}

/// Multi-client key event server.
///
/// Must be started from within a Tokio runtime.
pub struct StreamingServer {
    options: ServerOptions,
    state: Mutex<ServerState>,
    local_addr: Mutex<Option<SocketAddr>>,
    acceptor: Mutex<Option<JoinHandle<()>>>,
    shared: Arc<Shared>,
}

impl StreamingServer {
    /// Creates an `Idle` server.  Nothing is bound until [`start`](Self::start).
    pub fn new(options: ServerOptions) -> Self {
        Self {
            options,
            state: Mutex::new(ServerState::Idle),
            local_addr: Mutex::new(None),
            acceptor: Mutex::new(None),
            shared: Arc::new(Shared {
                running: AtomicBool::new(false),
                roster: SessionRoster::new(),
            }),
        }
    }

    pub fn options(&self) -> &ServerOptions {
        &self.options
    }

    pub fn state(&self) -> ServerState {
        *lock(&self.state)
    }

    /// The address actually bound, once listening.  Useful when the
    /// configured port is 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *lock(&self.local_addr)
    }

    /// Number of sessions currently in the roster.
    pub fn active_sessions(&self) -> usize {
        self.shared.roster.len()
    }

    pub fn session_peers(&self) -> Vec<SocketAddr> {
        self.shared.roster.peers()
    }

    /// Binds, listens, and starts accepting in the background.
    ///
    /// Every decoded event goes to `handler`; `None` selects
    /// [`ConsoleHandler`].  Returns the bound address.
    ///
    /// # Errors
    ///
    /// - [`ServerError::BindFailed`] if the socket cannot be bound or put in
    ///   listening mode.  The server moves to [`ServerState::Stopped`].
    /// - [`ServerError::AlreadyStarted`] if called while listening.
    /// - [`ServerError::NotRestartable`] if called after a stop.
    pub async fn start(
        &self,
        handler: Option<Arc<dyn EventHandler>>,
    ) -> Result<SocketAddr, ServerError> {
        let mut state = lock(&self.state);
        match *state {
            ServerState::Idle => {}
            ServerState::Listening => return Err(ServerError::AlreadyStarted),
            ServerState::Stopped => return Err(ServerError::NotRestartable),
        }

        let addr = self.options.bind_addr;
        let (listener, local_addr) = match bind_listener(addr, self.options.backlog) {
            Ok(bound) => bound,
            Err(source) => {
                error!("failed to listen on {addr}: {source}");
                *state = ServerState::Stopped;
                return Err(ServerError::BindFailed { addr, source });
            }
        };

        self.shared.running.store(true, Ordering::SeqCst);
        let handler =
            handler.unwrap_or_else(|| Arc::new(ConsoleHandler) as Arc<dyn EventHandler>);
        let task = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&self.shared),
            handler,
            self.options.clone(),
        ));

        *lock(&self.acceptor) = Some(task);
        *lock(&self.local_addr) = Some(local_addr);
        *state = ServerState::Listening;
        info!("listening on {local_addr}");
        Ok(local_addr)
    }

    /// Stops accepting and closes every session.
    ///
    /// Clears the running flag, closes every socket in the roster, then
    /// closes the listening socket.  Returns once the listener is closed.
    /// Handler calls already in progress are not awaited.  Calling `stop()`
    /// more than once, or on a server that never started, is harmless.
    pub async fn stop(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
        let closed = self.shared.roster.close_all();

        let acceptor = lock(&self.acceptor).take();
        if let Some(task) = acceptor {
            task.abort();
            // Resolves once the task is dropped, i.e. the listener is closed.
            let _ = task.await;
        }

        let mut state = lock(&self.state);
        if *state != ServerState::Stopped {
            *state = ServerState::Stopped;
            info!("server stopped ({closed} sessions closed)");
        }
    }
}

impl Drop for StreamingServer {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        self.shared.roster.close_all();
        if let Some(task) = lock(&self.acceptor).take() {
            task.abort();
        }
    }
}

// ── Accept loop ───────────────────────────────────────────────────────────────

fn bind_listener(addr: SocketAddr, backlog: u32) -> io::Result<(TcpListener, SocketAddr)> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    #[cfg(unix)]
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    let listener = socket.listen(backlog)?;
    let local_addr = listener.local_addr()?;
    Ok((listener, local_addr))
}

async fn accept_loop(
    listener: TcpListener,
    shared: Arc<Shared>,
    handler: Arc<dyn EventHandler>,
    options: ServerOptions,
) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                if !admit(&shared, &handler, &options, stream, peer) {
                    break;
                }
            }
            Err(e) => {
                if !shared.running.load(Ordering::SeqCst) {
                    break;
                }
                // Transient (e.g. too many open files): keep accepting.
                error!("accept error: {e}");
                tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
            }
        }
    }
    debug!("accept loop exited");
}

/// Registers and spawns a session for `stream`.  Returns `false` if the
/// server stopped first, in which case `stream` is dropped unserviced.
fn admit(
    shared: &Arc<Shared>,
    handler: &Arc<dyn EventHandler>,
    options: &ServerOptions,
    stream: TcpStream,
    peer: SocketAddr,
) -> bool {
    let admitted = shared.roster.admit(&shared.running, peer, |id| {
        let mut session = Session::new(
            id,
            peer,
            stream,
            options.max_frame_len,
            options.read_buffer_len,
        );
        let shared = Arc::clone(shared);
        let handler = Arc::clone(handler);
        tokio::spawn(async move {
            let end = session.run(&shared.running, handler.as_ref()).await;
            log_session_end(session.id(), session.peer(), &end);
            shared.roster.remove(session.id());
        })
    });

    match admitted {
        Some(id) => {
            info!("new connection from {peer} (session {id})");
            true
        }
        None => {
            debug!("refusing connection from {peer}: server stopping");
            false
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback() -> ServerOptions {
        ServerOptions::bind("127.0.0.1:0".parse().unwrap())
    }

    #[test]
    fn test_default_options_match_documented_defaults() {
        let options = ServerOptions::default();

        assert_eq!(options.bind_addr.to_string(), "0.0.0.0:12345");
        assert_eq!(options.backlog, 5);
        assert_eq!(options.max_frame_len, Some(64 * 1024));
        assert_eq!(options.read_buffer_len, 4096);
    }

    #[test]
    fn test_new_server_is_idle_and_unbound() {
        let server = StreamingServer::new(loopback());

        assert_eq!(server.state(), ServerState::Idle);
        assert!(server.local_addr().is_none());
        assert_eq!(server.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_start_binds_ephemeral_port_and_listens() {
        let server = StreamingServer::new(loopback());

        let addr = server.start(None).await.unwrap();

        assert_ne!(addr.port(), 0);
        assert_eq!(server.local_addr(), Some(addr));
        assert_eq!(server.state(), ServerState::Listening);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_second_start_is_rejected_while_listening() {
        let server = StreamingServer::new(loopback());
        server.start(None).await.unwrap();

        let result = server.start(None).await;

        assert!(matches!(result, Err(ServerError::AlreadyStarted)));
        assert_eq!(server.state(), ServerState::Listening);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_terminal() {
        // Arrange
        let server = StreamingServer::new(loopback());
        server.start(None).await.unwrap();

        // Act
        server.stop().await;
        server.stop().await;

        // Assert
        assert_eq!(server.state(), ServerState::Stopped);
        assert!(matches!(
            server.start(None).await,
            Err(ServerError::NotRestartable)
        ));
    }

    #[tokio::test]
    async fn test_stop_on_idle_server_moves_to_stopped() {
        let server = StreamingServer::new(loopback());

        server.stop().await;

        assert_eq!(server.state(), ServerState::Stopped);
    }
}
