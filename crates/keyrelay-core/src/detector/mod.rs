//! Edge detection: turning sampled key state into press/release events.
//!
//! The platform only offers a level query ("is this key down right now?").
//! [`EdgeDetector`] samples every catalogued key once per tick, diffs the
//! result against the set of keys it saw pressed on the previous tick, and
//! emits one [`KeyEvent`] per transition.  Keys whose state did not change
//! produce nothing, so holding a key down yields exactly one `pressed` and,
//! later, exactly one `released`.
//!
//! # Seams
//!
//! - [`KeyStateSource`] abstracts the platform primitive.  The Windows
//!   implementation lives in `keyrelay-client`; tests use
//!   [`mock::ScriptedKeyState`].
//! - [`EventSink`] abstracts delivery.  The client delivers into a channel
//!   drained by its network writer; tests collect into a `Vec`.
//!
//! # Threading
//!
//! [`EdgeDetector::spawn`] moves the detector, its source and its sink onto
//! a dedicated thread.  The pressed set is owned by that thread alone and is
//! never shared.  Delivery is synchronous: a sink that blocks delays the next
//! tick.

use std::collections::HashSet;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info};

use crate::domain::event::{KeyEvent, KeyState, Modifier, ModifierSet};
use crate::keymap::{KeyCatalog, KeyCode};

pub mod mock;

/// Bit set in a key-state bitmask while the key is held down.
pub const PRESSED_BIT: u16 = 0x8000;

/// Default pause between two polling ticks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Returns `true` if `state` has [`PRESSED_BIT`] set.
pub fn is_down(state: u16) -> bool {
    state & PRESSED_BIT != 0
}

/// Error reported by a [`KeyStateSource`].
#[derive(Debug, Error)]
pub enum KeyStateError {
    #[error("key state query failed for key {code}: {reason}")]
    QueryFailed { code: KeyCode, reason: String },
    #[error("key state source unavailable: {0}")]
    Unavailable(String),
}

/// Error reported by an [`EventSink`].
#[derive(Debug, Error)]
pub enum SinkError {
    /// The consumer went away; no further events can be delivered.
    #[error("event sink closed")]
    Closed,
    #[error("event delivery failed: {0}")]
    Failed(String),
}

/// Reasons the polling loop stops with an error.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error(transparent)]
    KeyState(#[from] KeyStateError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error("failed to spawn detector thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("detector thread panicked")]
    Panicked,
}

/// The platform key-state primitive.
///
/// Implementations must be cheap enough to call for every catalogued key at
/// 100 Hz or more.
pub trait KeyStateSource {
    /// Returns the raw state bitmask for `code`; [`PRESSED_BIT`] means down.
    fn key_state(&mut self, code: KeyCode) -> Result<u16, KeyStateError>;

    /// Called once at the start of every tick, before any key is queried.
    fn begin_tick(&mut self) {}
}

impl<S: KeyStateSource + ?Sized> KeyStateSource for Box<S> {
    fn key_state(&mut self, code: KeyCode) -> Result<u16, KeyStateError> {
        (**self).key_state(code)
    }

    fn begin_tick(&mut self) {
        (**self).begin_tick();
    }
}

/// Destination for detected events.
pub trait EventSink {
    fn deliver(&mut self, event: KeyEvent) -> Result<(), SinkError>;
}

impl EventSink for Vec<KeyEvent> {
    fn deliver(&mut self, event: KeyEvent) -> Result<(), SinkError> {
        self.push(event);
        Ok(())
    }
}

impl<K: EventSink + ?Sized> EventSink for Box<K> {
    fn deliver(&mut self, event: KeyEvent) -> Result<(), SinkError> {
        (**self).deliver(event)
    }
}

/// Samples the modifier keys directly from `source`.
///
/// Modifiers are queried independently of the pressed set, so they reflect
/// the state at the moment of the call, including a modifier that is itself
/// the key being reported.
pub fn sample_modifiers<S: KeyStateSource + ?Sized>(
    source: &mut S,
) -> Result<ModifierSet, KeyStateError> {
    let mut set = ModifierSet::empty();
    for modifier in Modifier::ALL {
        if is_down(source.key_state(modifier.key_code())?) {
            set.insert(modifier);
        }
    }
    Ok(set)
}

/// Edge-triggered keyboard monitor.
pub struct EdgeDetector {
    catalog: KeyCatalog,
    pressed: HashSet<KeyCode>,
}

impl EdgeDetector {
    /// Creates a detector with an empty pressed set.
    pub fn new(catalog: KeyCatalog) -> Self {
        Self {
            catalog,
            pressed: HashSet::new(),
        }
    }

    pub fn catalog(&self) -> &KeyCatalog {
        &self.catalog
    }

    /// Whether the detector currently considers `code` held down.
    pub fn is_pressed(&self, code: KeyCode) -> bool {
        self.pressed.contains(&code)
    }

    pub fn pressed_count(&self) -> usize {
        self.pressed.len()
    }

    /// Runs one tick: samples every catalogued key in catalog order and
    /// delivers one event per transition.
    ///
    /// Returns the number of events delivered.
    ///
    /// # Errors
    ///
    /// Returns [`DetectorError::KeyState`] if the source fails and
    /// [`DetectorError::Sink`] if the sink rejects an event.  Transitions
    /// recorded before the failure stay recorded.
    pub fn poll<S, K>(&mut self, source: &mut S, sink: &mut K) -> Result<usize, DetectorError>
    where
        S: KeyStateSource + ?Sized,
        K: EventSink + ?Sized,
    {
        source.begin_tick();
        let catalog = self.catalog;
        let mut delivered = 0;

        for code in catalog.codes() {
            let down = is_down(source.key_state(code)?);
            let state = match (down, self.pressed.contains(&code)) {
                (true, false) => {
                    self.pressed.insert(code);
                    KeyState::Pressed
                }
                (false, true) => {
                    self.pressed.remove(&code);
                    KeyState::Released
                }
                _ => continue,
            };

            let modifiers = sample_modifiers(source)?;
            let event = KeyEvent::new(catalog.name(code), state, modifiers);
            debug!("key transition: {event}");
            sink.deliver(event)?;
            delivered += 1;
        }

        Ok(delivered)
    }

    /// Polls every `interval` until `running` is cleared.
    ///
    /// The flag is checked at the top of each iteration.  On error the flag
    /// is cleared before returning, so observers see the loop as stopped.
    ///
    /// # Errors
    ///
    /// Propagates the first [`DetectorError`] from [`poll`](Self::poll);
    /// failures are not retried.
    pub fn run<S, K>(
        &mut self,
        source: &mut S,
        sink: &mut K,
        interval: Duration,
        running: &AtomicBool,
    ) -> Result<(), DetectorError>
    where
        S: KeyStateSource + ?Sized,
        K: EventSink + ?Sized,
    {
        while running.load(Ordering::SeqCst) {
            if let Err(e) = self.poll(source, sink) {
                running.store(false, Ordering::SeqCst);
                return Err(e);
            }
            thread::sleep(interval);
        }
        Ok(())
    }

    /// Moves the detector onto a dedicated polling thread.
    ///
    /// The loop runs until `running` is cleared (by [`DetectorHandle::stop`]
    /// or by anyone else holding the flag) or until it fails.  The flag is
    /// set to `true` before the thread starts.
    ///
    /// # Errors
    ///
    /// Returns [`DetectorError::Spawn`] if the OS refuses to create the thread.
    pub fn spawn<S, K>(
        mut self,
        mut source: S,
        mut sink: K,
        interval: Duration,
        running: Arc<AtomicBool>,
    ) -> Result<DetectorHandle, DetectorError>
    where
        S: KeyStateSource + Send + 'static,
        K: EventSink + Send + 'static,
    {
        running.store(true, Ordering::SeqCst);
        let flag = Arc::clone(&running);

        let thread = thread::Builder::new()
            .name("keyrelay-poll".to_string())
            .spawn(move || {
                info!(
                    "polling {} keys every {:?}",
                    self.catalog.len(),
                    interval
                );
                let result = self.run(&mut source, &mut sink, interval, &flag);
                match &result {
                    Ok(()) => info!("key polling stopped"),
                    Err(e) => error!("key polling aborted: {e}"),
                }
                result
            })
            .map_err(|e| {
                running.store(false, Ordering::SeqCst);
                DetectorError::Spawn(e)
            })?;

        Ok(DetectorHandle {
            running,
            thread: Some(thread),
        })
    }
}

/// Handle to a detector running on its own thread.
pub struct DetectorHandle {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<Result<(), DetectorError>>>,
}

impl DetectorHandle {
    /// `false` once the loop has been asked to stop or has failed.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Asks the loop to stop and waits for the thread to exit.
    ///
    /// Events delivered before the loop observed the flag have all reached
    /// the sink when this returns.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the loop, if it ended with one, or
    /// [`DetectorError::Panicked`] if the thread panicked.
    pub fn stop(mut self) -> Result<(), DetectorError> {
        self.running.store(false, Ordering::SeqCst);
        self.join_thread()
    }

    fn join_thread(&mut self) -> Result<(), DetectorError> {
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| DetectorError::Panicked)?,
            None => Ok(()),
        }
    }
}

impl Drop for DetectorHandle {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.join_thread();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
