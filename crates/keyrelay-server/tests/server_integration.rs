//! Integration tests for `StreamingServer` over real loopback sockets.
//!
//! Every test binds `127.0.0.1:0`, so tests never collide on a port and can
//! run in parallel.  Events are captured through a closure handler that
//! forwards `(peer, event)` pairs into an unbounded channel.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use keyrelay_core::{encode_event, KeyEvent, KeyState, Modifier, ModifierSet, ProtocolError};
use keyrelay_server::application::dispatch_events::EventHandler;
use keyrelay_server::infrastructure::{ServerError, ServerOptions, ServerState, StreamingServer};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::time::{sleep, timeout};

const WAIT: Duration = Duration::from_secs(2);

// ── Helpers ───────────────────────────────────────────────────────────────────

fn loopback() -> ServerOptions {
    ServerOptions::bind("127.0.0.1:0".parse().unwrap())
}

/// Starts a server whose handler forwards every event into the returned
/// receiver.
async fn start_capturing(
    options: ServerOptions,
) -> (StreamingServer, SocketAddr, UnboundedReceiver<(SocketAddr, KeyEvent)>) {
    let (tx, rx) = unbounded_channel();
    let handler: Arc<dyn EventHandler> = Arc::new(move |peer: SocketAddr, event: KeyEvent| {
        let _ = tx.send((peer, event));
    });
    let server = StreamingServer::new(options);
    let addr = server.start(Some(handler)).await.expect("server must start");
    (server, addr, rx)
}

async fn next_event(rx: &mut UnboundedReceiver<(SocketAddr, KeyEvent)>) -> (SocketAddr, KeyEvent) {
    timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("handler channel closed")
}

/// Polls `condition` until it holds or [`WAIT`] elapses.
async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(10)).await;
    }
    condition()
}

fn event(key: &str, state: KeyState, modifiers: &[Modifier]) -> KeyEvent {
    KeyEvent::at(
        key,
        state,
        modifiers.iter().copied().collect::<ModifierSet>(),
        1_700_000_000.5,
    )
}

fn wire(event: &KeyEvent) -> Vec<u8> {
    encode_event(event).expect("encode must succeed")
}

// ── Delivery ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_event_is_delivered_unchanged_with_peer_address() {
    // Arrange
    let (server, addr, mut rx) = start_capturing(loopback()).await;
    let mut client = TcpStream::connect(addr).await.unwrap();
    let sent = event("A", KeyState::Pressed, &[Modifier::Ctrl, Modifier::Shift]);

    // Act
    client.write_all(&wire(&sent)).await.unwrap();
    let (peer, received) = next_event(&mut rx).await;

    // Assert
    assert_eq!(received, sent);
    assert_eq!(peer, client.local_addr().unwrap());
    server.stop().await;
}

#[tokio::test]
async fn test_message_split_across_two_reads_yields_one_event() {
    let (server, addr, mut rx) = start_capturing(loopback()).await;
    let mut client = TcpStream::connect(addr).await.unwrap();
    let sent = event("Space", KeyState::Released, &[]);
    let bytes = wire(&sent);
    let (head, tail) = bytes.split_at(bytes.len() / 2);

    client.write_all(head).await.unwrap();
    client.flush().await.unwrap();
    sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err(), "half a message must not be delivered");
    client.write_all(tail).await.unwrap();

    let (_, received) = next_event(&mut rx).await;
    assert_eq!(received, sent);
    sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err(), "exactly one event expected");
    server.stop().await;
}

#[tokio::test]
async fn test_several_messages_in_one_write_arrive_in_order() {
    let (server, addr, mut rx) = start_capturing(loopback()).await;
    let mut client = TcpStream::connect(addr).await.unwrap();
    let sent = vec![
        event("Shift", KeyState::Pressed, &[Modifier::Shift]),
        event("B", KeyState::Pressed, &[Modifier::Shift]),
        event("B", KeyState::Released, &[Modifier::Shift]),
        event("Shift", KeyState::Released, &[]),
    ];
    let batch: Vec<u8> = sent.iter().flat_map(wire).collect();

    client.write_all(&batch).await.unwrap();

    let mut received = Vec::new();
    for _ in 0..sent.len() {
        received.push(next_event(&mut rx).await.1);
    }
    assert_eq!(received, sent);
    server.stop().await;
}

#[tokio::test]
async fn test_two_sessions_keep_separate_framing_state() {
    // Arrange: client 1 leaves half a message buffered on the server.
    let (server, addr, mut rx) = start_capturing(loopback()).await;
    let mut one = TcpStream::connect(addr).await.unwrap();
    let mut two = TcpStream::connect(addr).await.unwrap();
    let from_one = event("A", KeyState::Pressed, &[]);
    let from_two = event("Z", KeyState::Pressed, &[Modifier::Alt]);
    let bytes_one = wire(&from_one);
    let (head, tail) = bytes_one.split_at(10);

    // Act
    one.write_all(head).await.unwrap();
    sleep(Duration::from_millis(50)).await;
    two.write_all(&wire(&from_two)).await.unwrap();
    let first = next_event(&mut rx).await;
    one.write_all(tail).await.unwrap();
    let second = next_event(&mut rx).await;

    // Assert: client 2's line was not glued onto client 1's partial line.
    assert_eq!(first, (two.local_addr().unwrap(), from_two));
    assert_eq!(second, (one.local_addr().unwrap(), from_one));
    server.stop().await;
}

/// Forwards events like the closure handler and also records every
/// malformed line reported for a peer.
struct RecordingHandler {
    events: UnboundedSender<(SocketAddr, KeyEvent)>,
    /// `(peer, was a MalformedMessage)` per report.
    malformed: Mutex<Vec<(SocketAddr, bool)>>,
}

impl EventHandler for RecordingHandler {
    fn on_event(&self, peer: SocketAddr, event: KeyEvent) {
        let _ = self.events.send((peer, event));
    }

    fn on_malformed(&self, peer: SocketAddr, error: &ProtocolError) {
        let is_malformed = matches!(error, ProtocolError::MalformedMessage(_));
        self.malformed.lock().unwrap().push((peer, is_malformed));
    }
}

#[tokio::test]
async fn test_malformed_line_is_reported_and_session_continues() {
    // Arrange
    let (tx, mut rx) = unbounded_channel();
    let handler = Arc::new(RecordingHandler {
        events: tx,
        malformed: Mutex::new(Vec::new()),
    });
    let server = StreamingServer::new(loopback());
    let addr = server
        .start(Some(Arc::clone(&handler) as Arc<dyn EventHandler>))
        .await
        .expect("server must start");
    let mut client = TcpStream::connect(addr).await.unwrap();
    let client_addr = client.local_addr().unwrap();
    let sent = event("Enter", KeyState::Pressed, &[]);

    // Act
    client.write_all(b"this is not json\n").await.unwrap();
    client.write_all(b"{\"key\":\"A\"}\n").await.unwrap();
    client.write_all(&wire(&sent)).await.unwrap();

    // Assert: lines are handled in order, so both reports precede the event.
    let (_, received) = next_event(&mut rx).await;
    assert_eq!(received, sent);
    {
        let malformed = handler.malformed.lock().unwrap();
        assert_eq!(malformed.len(), 2);
        assert_eq!(*malformed, vec![(client_addr, true), (client_addr, true)]);
    }
    assert_eq!(server.active_sessions(), 1);
    server.stop().await;
}

#[tokio::test]
async fn test_oversized_line_is_dropped_and_stream_resyncs() {
    // Arrange
    let options = ServerOptions {
        max_frame_len: Some(128),
        ..loopback()
    };
    let (server, addr, mut rx) = start_capturing(options).await;
    let mut client = TcpStream::connect(addr).await.unwrap();
    let sent = event("Tab", KeyState::Released, &[]);
    let mut stream = vec![b'x'; 1000];
    stream.push(b'\n');
    stream.extend(wire(&sent));

    // Act
    client.write_all(&stream).await.unwrap();

    // Assert
    let (_, received) = next_event(&mut rx).await;
    assert_eq!(received, sent);
    assert_eq!(server.active_sessions(), 1);
    server.stop().await;
}

// ── Roster ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_peer_disconnect_removes_session_from_roster() {
    let (server, addr, _rx) = start_capturing(loopback()).await;
    let client = TcpStream::connect(addr).await.unwrap();
    assert!(wait_until(|| server.active_sessions() == 1).await);

    drop(client);

    assert!(wait_until(|| server.active_sessions() == 0).await);
    assert_eq!(server.state(), ServerState::Listening);
    server.stop().await;
}

#[tokio::test]
async fn test_stop_closes_all_sessions_and_the_listener() {
    // Arrange
    let (server, addr, _rx) = start_capturing(loopback()).await;
    let mut clients = Vec::new();
    for _ in 0..3 {
        clients.push(TcpStream::connect(addr).await.unwrap());
    }
    assert!(wait_until(|| server.active_sessions() == 3).await);
    let mut peers = server.session_peers();
    peers.sort();
    let mut expected: Vec<SocketAddr> = clients.iter().map(|c| c.local_addr().unwrap()).collect();
    expected.sort();
    assert_eq!(peers, expected);

    // Act
    server.stop().await;

    // Assert: every client sees EOF (or a reset), and the port refuses.
    for client in &mut clients {
        let mut buf = [0u8; 16];
        let read = timeout(WAIT, client.read(&mut buf))
            .await
            .expect("session socket was not closed");
        assert!(matches!(read, Ok(0) | Err(_)));
    }
    assert_eq!(server.active_sessions(), 0);
    assert_eq!(server.state(), ServerState::Stopped);
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_events_after_stop_are_not_delivered() {
    let (server, addr, mut rx) = start_capturing(loopback()).await;
    let mut client = TcpStream::connect(addr).await.unwrap();
    assert!(wait_until(|| server.active_sessions() == 1).await);

    server.stop().await;
    // The write may succeed into the kernel buffer or fail with a reset.
    let _ = client.write_all(&wire(&event("A", KeyState::Pressed, &[]))).await;

    sleep(Duration::from_millis(100)).await;
    assert!(rx.try_recv().is_err());
}

// ── Lifecycle ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_bind_failure_moves_server_to_stopped() {
    // Arrange: occupy a port with a first server.
    let (first, addr, _rx) = start_capturing(loopback()).await;
    let second = StreamingServer::new(ServerOptions::bind(addr));

    // Act
    let result = second.start(None).await;

    // Assert
    match result {
        Err(ServerError::BindFailed { addr: failed, .. }) => assert_eq!(failed, addr),
        other => panic!("expected BindFailed, got {other:?}"),
    }
    assert_eq!(second.state(), ServerState::Stopped);
    assert!(matches!(
        second.start(None).await,
        Err(ServerError::NotRestartable)
    ));
    first.stop().await;
}

#[tokio::test]
async fn test_stopped_server_cannot_be_restarted() {
    let (server, _addr, _rx) = start_capturing(loopback()).await;
    server.stop().await;

    let result = server.start(None).await;

    assert!(matches!(result, Err(ServerError::NotRestartable)));
}
