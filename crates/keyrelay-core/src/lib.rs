//! # keyrelay-core
//!
//! Shared library for keyrelay containing the key catalog, the edge
//! detector that turns sampled key state into press/release events, the
//! line-delimited JSON codec, and the stream framer.
//!
//! This crate is used by both the client and server applications.
//! It has no dependencies on OS key-state APIs or network sockets.
//!
//! # Architecture overview
//!
//! keyrelay watches the keyboard on one machine and streams every key
//! transition to one or more listeners over TCP:
//!
//! ```text
//! raw key state → EdgeDetector → encode_event → socket → LineFramer → decode_event → handler
//! ```
//!
//! - **`keymap`** – The static [`KeyCatalog`] of platform key codes and
//!   their display names.
//!
//! - **`domain`** – The immutable [`KeyEvent`] record, its [`KeyState`],
//!   and the ordered [`ModifierSet`].
//!
//! - **`detector`** – The [`EdgeDetector`] polling loop and the two seams
//!   it depends on: [`KeyStateSource`] (the platform primitive) and
//!   [`EventSink`] (where events go).
//!
//! - **`protocol`** – How events travel on the wire: one JSON object per
//!   line, and the [`LineFramer`] that reassembles lines from arbitrary
//!   socket reads.
//!
//! - **`config`** – Locating, loading and saving TOML config files.

pub mod config;
pub mod detector;
pub mod domain;
pub mod keymap;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `keyrelay_core::KeyEvent` instead of `keyrelay_core::domain::event::KeyEvent`.
pub use detector::{DetectorError, DetectorHandle, EdgeDetector, EventSink, KeyStateSource};
pub use domain::event::{KeyEvent, KeyState, Modifier, ModifierSet};
pub use keymap::{KeyCatalog, KeyCode};
pub use protocol::codec::{decode_event, encode_event, ProtocolError};
pub use protocol::framer::{FrameError, LineFramer};
