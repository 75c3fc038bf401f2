//! JSON line codec for [`KeyEvent`]s.
//!
//! Wire format (one line per event):
//! ```text
//! {"key":"A","state":"pressed","modifiers":["Ctrl"],"timestamp":1718000000.25}\n
//! ```
//!
//! `key` and `state` are required.  `modifiers` defaults to an empty list and
//! `timestamp` to `0.0` when absent.

use serde_json::Error as JsonError;
use thiserror::Error;

use crate::domain::event::KeyEvent;

/// Line terminator for every message.
pub const DELIMITER: u8 = b'\n';

/// Errors that can occur during event encoding or decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The line is not valid JSON, is not an object, or lacks a required
    /// field.  The line should be discarded; the stream stays usable.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// The event could not be serialised.
    #[error("failed to encode event: {0}")]
    Encode(#[source] JsonError),
}

/// Encodes `event` as one JSON object followed by `\n`.
///
/// # Errors
///
/// Returns [`ProtocolError::Encode`] if serialisation fails.
///
/// # Examples
///
/// ```rust
/// use keyrelay_core::{encode_event, KeyEvent, KeyState, ModifierSet};
///
/// let event = KeyEvent::at("A", KeyState::Pressed, ModifierSet::empty(), 2.0);
/// let bytes = encode_event(&event).unwrap();
/// assert_eq!(bytes, b"{\"key\":\"A\",\"state\":\"pressed\",\"modifiers\":[],\"timestamp\":2.0}\n");
/// ```
pub fn encode_event(event: &KeyEvent) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = serde_json::to_vec(event).map_err(ProtocolError::Encode)?;
    buf.push(DELIMITER);
    Ok(buf)
}

/// Decodes one line (without its delimiter) into a [`KeyEvent`].
///
/// A trailing `\r` or other surrounding whitespace is tolerated.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedMessage`] if the line is not a JSON
/// object with valid `key` and `state` fields.
pub fn decode_event(line: &[u8]) -> Result<KeyEvent, ProtocolError> {
    match line.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'{') => {}
        Some(_) => {
            return Err(ProtocolError::MalformedMessage(
                "expected a JSON object".to_string(),
            ))
        }
        None => return Err(ProtocolError::MalformedMessage("empty line".to_string())),
    }
    serde_json::from_slice(line).map_err(|e| ProtocolError::MalformedMessage(e.to_string()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
