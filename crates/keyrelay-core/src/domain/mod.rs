//! Domain entities for keyrelay.
//!
//! This module contains pure data types with no infrastructure dependencies.
//! Everything the detector produces and the wire carries is defined here, so
//! the types can be compiled and tested on any platform without a keyboard
//! or a socket.

/// Key events and modifier sets.
///
/// See [`event::KeyEvent`] for the main type.
pub mod event;
