//! Key events as produced by the edge detector and carried on the wire.
//!
//! A [`KeyEvent`] is created at the moment a transition is detected and is
//! never mutated afterwards.  Its JSON representation is the wire schema:
//!
//! ```json
//! {"key":"A","state":"pressed","modifiers":["Ctrl","Shift"],"timestamp":1718000000.25}
//! ```

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::keymap::KeyCode;

/// Whether a key went down or came up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyState {
    Pressed,
    Released,
}

impl KeyState {
    /// The wire spelling: `"pressed"` or `"released"`.
    pub fn as_str(self) -> &'static str {
        match self {
            KeyState::Pressed => "pressed",
            KeyState::Released => "released",
        }
    }
}

impl fmt::Display for KeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked modifier key.
///
/// The declaration order is the fixed priority order used everywhere a set
/// of modifiers is listed: Ctrl, then Shift, then Alt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Modifier {
    Ctrl,
    Shift,
    Alt,
}

impl Modifier {
    /// All modifiers in priority order.
    pub const ALL: [Modifier; 3] = [Modifier::Ctrl, Modifier::Shift, Modifier::Alt];

    /// The platform key code queried to decide whether this modifier is down
    /// (the side-agnostic `VK_CONTROL`, `VK_SHIFT` and `VK_MENU` codes).
    pub const fn key_code(self) -> KeyCode {
        match self {
            Modifier::Ctrl => KeyCode(0x11),
            Modifier::Shift => KeyCode(0x10),
            Modifier::Alt => KeyCode(0x12),
        }
    }

    /// The label used on the wire and in console output.
    pub const fn label(self) -> &'static str {
        match self {
            Modifier::Ctrl => "Ctrl",
            Modifier::Shift => "Shift",
            Modifier::Alt => "Alt",
        }
    }

    const fn bit(self) -> u8 {
        match self {
            Modifier::Ctrl => 1 << 0,
            Modifier::Shift => 1 << 1,
            Modifier::Alt => 1 << 2,
        }
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An ordered set of active modifiers.
///
/// Stored as a bitmask, so it cannot hold duplicates, and always iterates in
/// the fixed Ctrl, Shift, Alt order no matter how it was built.  On the wire
/// it is a JSON array of labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ModifierSet(u8);

impl ModifierSet {
    /// A set with no modifiers.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Returns a copy of this set with `modifier` added.
    pub const fn with(self, modifier: Modifier) -> Self {
        Self(self.0 | modifier.bit())
    }

    pub fn insert(&mut self, modifier: Modifier) {
        self.0 |= modifier.bit();
    }

    pub fn contains(&self, modifier: Modifier) -> bool {
        self.0 & modifier.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterates the active modifiers in priority order.
    pub fn iter(&self) -> impl Iterator<Item = Modifier> + '_ {
        Modifier::ALL.into_iter().filter(move |m| self.contains(*m))
    }

    /// The active modifier labels in priority order.
    pub fn labels(&self) -> Vec<&'static str> {
        self.iter().map(Modifier::label).collect()
    }
}

impl FromIterator<Modifier> for ModifierSet {
    fn from_iter<I: IntoIterator<Item = Modifier>>(iter: I) -> Self {
        let mut set = ModifierSet::empty();
        for modifier in iter {
            set.insert(modifier);
        }
        set
    }
}

impl Serialize for ModifierSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for ModifierSet {
    /// Accepts any array of modifier labels; order and duplicates in the
    /// input are normalised away.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let labels = Vec::<Modifier>::deserialize(deserializer)?;
        Ok(labels.into_iter().collect())
    }
}

/// One detected key transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyEvent {
    /// Display name from the key catalog (e.g. `"A"`, `"Enter"`, `"Key(255)"`).
    pub key: String,
    pub state: KeyState,
    /// Modifiers that were down when the event was built.
    #[serde(default)]
    pub modifiers: ModifierSet,
    /// Seconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: f64,
}

impl KeyEvent {
    /// Builds an event stamped with the current wall-clock time.
    pub fn new(key: impl Into<String>, state: KeyState, modifiers: ModifierSet) -> Self {
        Self::at(key, state, modifiers, unix_timestamp())
    }

    /// Builds an event with an explicit timestamp.
    pub fn at(
        key: impl Into<String>,
        state: KeyState,
        modifiers: ModifierSet,
        timestamp: f64,
    ) -> Self {
        Self {
            key: key.into(),
            state,
            modifiers,
            timestamp,
        }
    }
}

/// Console format: `Ctrl+Shift+A pressed`, or `A released` without modifiers.
impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for modifier in self.modifiers.iter() {
            write!(f, "{modifier}+")?;
        }
        write!(f, "{} {}", self.key, self.state)
    }
}

/// Current wall-clock time as fractional seconds since the Unix epoch.
///
/// Returns `0.0` if the system clock is set before the epoch.
pub fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
