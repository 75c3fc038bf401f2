//! Wire protocol: newline-delimited JSON over a TCP byte stream.
//!
//! Each message is one UTF-8 JSON object followed by a single `\n`.  There
//! is no handshake, no length prefix and no compression.

pub mod codec;
pub mod framer;

pub use codec::{decode_event, encode_event, ProtocolError};
pub use framer::{FrameError, LineFramer, DEFAULT_MAX_FRAME_LEN};
