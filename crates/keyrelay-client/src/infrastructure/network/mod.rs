//! Network infrastructure for the client: the streaming connection.
//!
//! Architecture:
//! - The [`EdgeDetector`] runs on its own OS thread ("keyrelay-poll") and
//!   delivers events into a bounded `mpsc` channel through [`QueueSink`].
//! - A Tokio writer task owns the socket, encodes each event as one JSON
//!   line and writes it.
//! - The poll loop never touches the socket, so a slow write delays polling
//!   only once the channel is full.
//!
//! A failed write clears the shared running flag: the client reports
//! `Stopped` from then on, the poll loop exits on its next tick and the
//! socket is closed.  Nothing is retried or buffered for
//! later, and the client never reconnects on its own.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use keyrelay_core::detector::{SinkError, DEFAULT_POLL_INTERVAL};
use keyrelay_core::{
    encode_event, DetectorError, DetectorHandle, EdgeDetector, EventSink, KeyCatalog, KeyEvent,
    KeyStateSource,
};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Errors that can occur in the client network layer.
#[derive(Debug, Error)]
pub enum ClientError {
    /// TCP connection to the server failed.
    #[error("failed to connect to server at {addr}: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// `connect` was called on a client that already has (or had) a
    /// connection.
    #[error("client is already connected")]
    AlreadyConnected,

    /// `start` was called before `connect`.
    #[error("client is not connected")]
    NotConnected,

    #[error("client is already streaming")]
    AlreadyStarted,

    /// The client has been stopped; build a new one to connect again.
    #[error("client has been stopped")]
    Stopped,

    #[error(transparent)]
    Detector(#[from] DetectorError),
}

/// Lifecycle state of a [`StreamingClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Idle,
    Connected,
    Streaming,
    Stopped,
}

/// Detector and writer parameters.
#[derive(Clone, Copy)]
pub struct ClientOptions {
    pub poll_interval: Duration,
    /// Capacity of the channel between the poll thread and the writer.
    pub channel_capacity: usize,
    pub catalog: KeyCatalog,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            channel_capacity: 256,
            catalog: KeyCatalog::standard(),
        }
    }
}

/// Delivers detector events into a Tokio channel from a non-async thread.
///
/// Blocks while the channel is full.  Must not be used from inside the
/// Tokio runtime.
pub struct QueueSink(pub mpsc::Sender<KeyEvent>);

impl EventSink for QueueSink {
    fn deliver(&mut self, event: KeyEvent) -> Result<(), SinkError> {
        self.0.blocking_send(event).map_err(|_| SinkError::Closed)
    }
}

/// Streams detected key events to one server over one TCP connection.
pub struct StreamingClient {
    options: ClientOptions,
    state: ClientState,
    stream: Option<TcpStream>,
    peer: Option<SocketAddr>,
    running: Arc<AtomicBool>,
    detector: Option<DetectorHandle>,
    writer: Option<JoinHandle<u64>>,
}

impl StreamingClient {
    pub fn new(options: ClientOptions) -> Self {
        Self {
            options,
            state: ClientState::Idle,
            stream: None,
            peer: None,
            running: Arc::new(AtomicBool::new(false)),
            detector: None,
            writer: None,
        }
    }

    /// Current lifecycle state.
    ///
    /// A streaming client whose running flag was cleared by a failed write
    /// or a key-state failure reports `Stopped` at once, before
    /// [`stop`](Self::stop) has released its resources.
    pub fn state(&self) -> ClientState {
        match self.state {
            ClientState::Streaming if !self.running.load(Ordering::SeqCst) => ClientState::Stopped,
            state => state,
        }
    }

    /// Address of the connected server.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// `true` while the poll loop and writer are active.  Turns `false` by
    /// itself when a write to the server fails.
    pub fn is_running(&self) -> bool {
        self.state() == ClientState::Streaming
    }

    /// Opens the TCP connection.  `host` may be a name or an IP literal.
    ///
    /// # Errors
    ///
    /// - [`ClientError::ConnectFailed`] if resolution or the TCP handshake
    ///   fails.  The client stays `Idle` and may try again.
    /// - [`ClientError::AlreadyConnected`] / [`ClientError::Stopped`] if this
    ///   client already used its one connection.
    pub async fn connect(&mut self, host: &str, port: u16) -> Result<SocketAddr, ClientError> {
        match self.state() {
            ClientState::Idle => {}
            ClientState::Connected | ClientState::Streaming => {
                return Err(ClientError::AlreadyConnected)
            }
            ClientState::Stopped => return Err(ClientError::Stopped),
        }

        let addr = format!("{host}:{port}");
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|source| ClientError::ConnectFailed {
                addr: addr.clone(),
                source,
            })?;
        // Key events are tiny; send each one as soon as it is written.
        if let Err(e) = stream.set_nodelay(true) {
            debug!("could not disable Nagle on {addr}: {e}");
        }
        let peer = stream
            .peer_addr()
            .map_err(|source| ClientError::ConnectFailed { addr, source })?;

        info!("connected to server at {peer}");
        self.stream = Some(stream);
        self.peer = Some(peer);
        self.state = ClientState::Connected;
        Ok(peer)
    }

    /// Starts polling `source` and streaming every detected event.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`ClientError::NotConnected`] before [`connect`](Self::connect).
    /// - [`ClientError::AlreadyStarted`] if already streaming.
    /// - [`ClientError::Stopped`] after a stop, including one caused by a
    ///   failed write.
    /// - [`ClientError::Detector`] if the poll thread cannot be spawned; the
    ///   client is then `Stopped`.
    pub async fn start<S>(&mut self, source: S) -> Result<(), ClientError>
    where
        S: KeyStateSource + Send + 'static,
    {
        match self.state() {
            ClientState::Connected => {}
            ClientState::Idle => return Err(ClientError::NotConnected),
            ClientState::Streaming => return Err(ClientError::AlreadyStarted),
            ClientState::Stopped => return Err(ClientError::Stopped),
        }
        let stream = self.stream.take().ok_or(ClientError::NotConnected)?;

        let (tx, rx) = mpsc::channel(self.options.channel_capacity.max(1));
        self.running.store(true, Ordering::SeqCst);
        self.writer = Some(tokio::spawn(write_loop(
            stream,
            rx,
            Arc::clone(&self.running),
        )));

        let detector = EdgeDetector::new(self.options.catalog);
        match detector.spawn(
            source,
            QueueSink(tx),
            self.options.poll_interval,
            Arc::clone(&self.running),
        ) {
            Ok(handle) => {
                self.detector = Some(handle);
                self.state = ClientState::Streaming;
                Ok(())
            }
            Err(e) => {
                // The sender was dropped with the closure, so the writer
                // sees a closed channel and shuts the socket down.
                self.stop().await?;
                Err(e.into())
            }
        }
    }

    /// Halts the poll loop and closes the connection.
    ///
    /// Events detected before the loop stopped are written before the socket
    /// is shut down.  Tolerates a socket that is already closed, including
    /// after a write failure.  Calling `stop` again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Detector`] if the poll loop had ended with a
    /// key-state failure or panicked.
    pub async fn stop(&mut self) -> Result<(), ClientError> {
        self.running.store(false, Ordering::SeqCst);

        let detector_result = match self.detector.take() {
            Some(handle) => tokio::task::spawn_blocking(move || handle.stop())
                .await
                .unwrap_or(Err(DetectorError::Panicked)),
            None => Ok(()),
        };

        if let Some(writer) = self.writer.take() {
            match writer.await {
                Ok(sent) => debug!("writer finished after {sent} events"),
                Err(e) => warn!("writer task failed: {e}"),
            }
        }

        // Connected but never started: just drop the socket.
        self.stream = None;
        if self.state != ClientState::Stopped {
            self.state = ClientState::Stopped;
            info!("client stopped");
        }

        match detector_result {
            // The writer went away first, i.e. a write failed.  That path
            // already logged the cause.
            Err(DetectorError::Sink(SinkError::Closed)) => Ok(()),
            other => other.map_err(ClientError::from),
        }
    }
}

/// Writes every queued event to `stream` until the channel closes or a
/// write fails.  Returns the number of events written.
async fn write_loop(
    mut stream: TcpStream,
    mut rx: mpsc::Receiver<KeyEvent>,
    running: Arc<AtomicBool>,
) -> u64 {
    let mut sent = 0;

    while let Some(event) = rx.recv().await {
        let bytes = match encode_event(&event) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("skipping event that could not be encoded: {e}");
                continue;
            }
        };
        if let Err(e) = stream.write_all(&bytes).await {
            warn!("write to server failed: {e}; stopping");
            running.store(false, Ordering::SeqCst);
            break;
        }
        sent += 1;
    }

    // Unblocks a poll thread waiting on a full channel.
    drop(rx);
    if let Err(e) = stream.shutdown().await {
        debug!("socket shutdown: {e}");
    }
    sent
}
