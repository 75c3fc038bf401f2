//! Test doubles for the detector seams.
//!
//! Allows tests to drive an [`EdgeDetector`](super::EdgeDetector) with
//! synthetic key-state snapshots, without a real keyboard or OS API.

use std::collections::{HashSet, VecDeque};
use std::sync::{mpsc, Arc, Mutex};

use super::{EventSink, KeyStateError, KeyStateSource, SinkError, PRESSED_BIT};
use crate::domain::event::KeyEvent;
use crate::keymap::KeyCode;

enum Step {
    Keys(HashSet<KeyCode>),
    Fail,
}

/// Replays a fixed sequence of snapshots, one per tick.
///
/// Each snapshot lists the codes that are down during that tick.  Once the
/// script is exhausted the last snapshot repeats forever.
pub struct ScriptedKeyState {
    script: VecDeque<Step>,
    current: Step,
    ticks: usize,
}

impl ScriptedKeyState {
    /// Creates a source with no keys down and an empty script.
    pub fn new() -> Self {
        Self {
            script: VecDeque::new(),
            current: Step::Keys(HashSet::new()),
            ticks: 0,
        }
    }

    /// Appends a tick during which exactly `pressed` are down.
    pub fn tick(mut self, pressed: &[KeyCode]) -> Self {
        self.script
            .push_back(Step::Keys(pressed.iter().copied().collect()));
        self
    }

    /// Appends a tick during which every query fails.
    pub fn fail(mut self) -> Self {
        self.script.push_back(Step::Fail);
        self
    }

    /// Number of ticks started so far.
    pub fn ticks(&self) -> usize {
        self.ticks
    }
}

impl Default for ScriptedKeyState {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyStateSource for ScriptedKeyState {
    fn key_state(&mut self, code: KeyCode) -> Result<u16, KeyStateError> {
        match &self.current {
            Step::Keys(pressed) if pressed.contains(&code) => Ok(PRESSED_BIT),
            Step::Keys(_) => Ok(0),
            Step::Fail => Err(KeyStateError::QueryFailed {
                code,
                reason: "scripted failure".to_string(),
            }),
        }
    }

    fn begin_tick(&mut self) {
        if let Some(next) = self.script.pop_front() {
            self.current = next;
        }
        self.ticks += 1;
    }
}

/// Live key state that tests can change while a detector thread polls it.
///
/// Clones share the same underlying set.
#[derive(Clone, Default)]
pub struct SharedKeyState {
    pressed: Arc<Mutex<HashSet<KeyCode>>>,
}

impl SharedKeyState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&self, code: KeyCode) {
        if let Ok(mut pressed) = self.pressed.lock() {
            pressed.insert(code);
        }
    }

    pub fn release(&self, code: KeyCode) {
        if let Ok(mut pressed) = self.pressed.lock() {
            pressed.remove(&code);
        }
    }
}

impl KeyStateSource for SharedKeyState {
    fn key_state(&mut self, code: KeyCode) -> Result<u16, KeyStateError> {
        let pressed = self
            .pressed
            .lock()
            .map_err(|_| KeyStateError::Unavailable("shared key state poisoned".to_string()))?;
        Ok(if pressed.contains(&code) { PRESSED_BIT } else { 0 })
    }
}

/// Forwards events into a std channel.
pub struct ChannelSink(pub mpsc::Sender<KeyEvent>);

impl EventSink for ChannelSink {
    fn deliver(&mut self, event: KeyEvent) -> Result<(), SinkError> {
        self.0.send(event).map_err(|_| SinkError::Closed)
    }
}

/// A sink whose consumer is already gone.
pub struct FailingSink;

impl EventSink for FailingSink {
    fn deliver(&mut self, _event: KeyEvent) -> Result<(), SinkError> {
        Err(SinkError::Closed)
    }
}
