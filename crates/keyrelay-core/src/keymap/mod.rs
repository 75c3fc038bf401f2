//! Key catalog: which platform key codes are watched and what they are called.
//!
//! The catalog is a statically constructed, immutable table.  Iteration
//! order is the table's insertion order, which is also the order in which
//! the edge detector polls keys on every tick.

use std::borrow::Cow;
use std::fmt;

pub mod windows_vk;

/// Opaque platform identifier for a physical key.
///
/// On Windows this is the Virtual-Key code passed to `GetAsyncKeyState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyCode(pub u16);

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One catalog row: a key code and its display name.
pub type KeyEntry = (KeyCode, &'static str);

/// Read-only mapping from [`KeyCode`] to display name.
#[derive(Debug, Clone, Copy)]
pub struct KeyCatalog {
    entries: &'static [KeyEntry],
}

impl KeyCatalog {
    /// The standard catalog: modifiers, navigation and editing keys,
    /// F1–F12, digits and letters.
    pub const fn standard() -> Self {
        Self {
            entries: windows_vk::STANDARD_KEYS,
        }
    }

    /// A catalog over a caller-supplied static table.
    pub const fn from_entries(entries: &'static [KeyEntry]) -> Self {
        Self { entries }
    }

    /// Display name for `code`, or the synthetic `Key(<code>)` label when the
    /// code is not in the catalog.  Never fails.
    pub fn name(&self, code: KeyCode) -> Cow<'static, str> {
        match self.lookup(code) {
            Some(name) => Cow::Borrowed(name),
            None => Cow::Owned(format!("Key({code})")),
        }
    }

    /// Display name for `code` if it is catalogued.
    pub fn lookup(&self, code: KeyCode) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(entry_code, _)| *entry_code == code)
            .map(|(_, name)| *name)
    }

    pub fn contains(&self, code: KeyCode) -> bool {
        self.lookup(code).is_some()
    }

    /// Catalogued codes in insertion order.
    pub fn codes(&self) -> impl Iterator<Item = KeyCode> + '_ {
        self.entries.iter().map(|(code, _)| *code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for KeyCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
