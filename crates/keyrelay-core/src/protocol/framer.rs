//! Reassembles newline-delimited messages from a byte stream.
//!
//! TCP delivers bytes, not messages: one read may carry half a message,
//! several messages, or a message split exactly on its delimiter.
//! [`LineFramer`] buffers whatever has not been terminated yet and yields a
//! message only after its `\n` has been seen.
//!
//! # Frame size limit
//!
//! A peer that never sends `\n` would otherwise grow the buffer without
//! bound.  Frames longer than the configured maximum are reported as
//! [`FrameError::FrameTooLong`]; their bytes are dropped up to and including
//! the next delimiter, after which framing resumes normally.

use thiserror::Error;

use super::codec::DELIMITER;

/// Default maximum frame length (64 KiB), delimiter excluded.
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024;

/// Framing failures.  None of them poison the framer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame exceeds maximum of {max} bytes ({discarded} bytes discarded)")]
    FrameTooLong { max: usize, discarded: usize },
}

/// Per-connection accumulator of undelimited bytes.
#[derive(Debug)]
pub struct LineFramer {
    buf: Vec<u8>,
    /// Prefix of `buf` already known to contain no delimiter.
    scanned: usize,
    max_frame_len: Option<usize>,
    /// Dropping the tail of an oversized frame until the next delimiter.
    discarding: bool,
}

impl LineFramer {
    /// Creates a framer with [`DEFAULT_MAX_FRAME_LEN`].
    pub fn new() -> Self {
        Self::with_max_frame_len(Some(DEFAULT_MAX_FRAME_LEN))
    }

    /// Creates a framer with a custom limit; `None` disables the limit.
    pub fn with_max_frame_len(max_frame_len: Option<usize>) -> Self {
        Self {
            buf: Vec::new(),
            scanned: 0,
            max_frame_len,
            discarding: false,
        }
    }

    pub fn max_frame_len(&self) -> Option<usize> {
        self.max_frame_len
    }

    /// Number of buffered bytes still waiting for a delimiter.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Appends `chunk` and returns every message it completed, in order.
    ///
    /// Each `Ok` item is one message with its delimiter removed.  Trailing
    /// bytes without a delimiter stay buffered for the next call.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Result<Vec<u8>, FrameError>> {
        let mut frames = Vec::new();
        let mut chunk = chunk;

        if self.discarding {
            match find_delimiter(chunk) {
                Some(pos) => {
                    self.discarding = false;
                    chunk = &chunk[pos + 1..];
                }
                None => return frames,
            }
        }

        self.buf.extend_from_slice(chunk);

        let mut start = 0;
        let mut search_from = self.scanned;
        while let Some(offset) = find_delimiter(&self.buf[search_from..]) {
            let end = search_from + offset;
            frames.push(check_len(&self.buf[start..end], self.max_frame_len));
            start = end + 1;
            search_from = start;
        }
        self.buf.drain(..start);
        self.scanned = self.buf.len();

        if let Some(max) = self.max_frame_len {
            if self.buf.len() > max {
                frames.push(Err(FrameError::FrameTooLong {
                    max,
                    discarded: self.buf.len(),
                }));
                self.buf.clear();
                self.scanned = 0;
                self.discarding = true;
            }
        }

        frames
    }

    /// Takes the unterminated remainder, leaving the framer empty.
    ///
    /// Used at end of stream to report bytes that never formed a message.
    pub fn take_remainder(&mut self) -> Vec<u8> {
        self.scanned = 0;
        self.discarding = false;
        std::mem::take(&mut self.buf)
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

fn find_delimiter(bytes: &[u8]) -> Option<usize> {
    bytes.iter().position(|b| *b == DELIMITER)
}

fn check_len(line: &[u8], max: Option<usize>) -> Result<Vec<u8>, FrameError> {
    match max {
        Some(max) if line.len() > max => Err(FrameError::FrameTooLong {
            max,
            discarded: line.len(),
        }),
        _ => Ok(line.to_vec()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_frames(frames: Vec<Result<Vec<u8>, FrameError>>) -> Vec<Vec<u8>> {
        frames.into_iter().map(|f| f.expect("frame must be ok")).collect()
    }

    #[test]
    fn test_feed_yields_nothing_until_delimiter_seen() {
        // Arrange
        let mut framer = LineFramer::new();

        // Act
        let frames = framer.feed(b"{\"key\":\"X\"");

        // Assert
        assert!(frames.is_empty());
        assert_eq!(framer.buffered_len(), 10);
    }

    #[test]
    fn test_message_split_across_two_reads_yields_exactly_one() {
        let mut framer = LineFramer::new();

        let first = framer.feed(br#"{"key":"X""#);
        let second = framer.feed(b",\"state\":\"pressed\"}\n");

        assert!(first.is_empty());
        assert_eq!(
            ok_frames(second),
            vec![br#"{"key":"X","state":"pressed"}"#.to_vec()]
        );
        assert!(framer.is_empty());
    }

    #[test]
    fn test_multiple_messages_in_one_read() {
        let mut framer = LineFramer::new();
        let frames = framer.feed(b"one\ntwo\nthr");
        assert_eq!(ok_frames(frames), vec![b"one".to_vec(), b"two".to_vec()]);
        assert_eq!(ok_frames(framer.feed(b"ee\n")), vec![b"three".to_vec()]);
    }

    #[test]
    fn test_split_exactly_on_delimiter() {
        let mut framer = LineFramer::new();
        assert!(framer.feed(b"abc").is_empty());
        assert_eq!(ok_frames(framer.feed(b"\n")), vec![b"abc".to_vec()]);
        assert!(framer.is_empty());
    }

    #[test]
    fn test_empty_line_is_yielded_as_empty_message() {
        let mut framer = LineFramer::new();
        assert_eq!(ok_frames(framer.feed(b"\n")), vec![Vec::<u8>::new()]);
    }

    #[test]
    fn test_empty_chunk_is_a_no_op() {
        let mut framer = LineFramer::new();
        framer.feed(b"par");
        assert!(framer.feed(b"").is_empty());
        assert_eq!(framer.buffered_len(), 3);
    }

    #[test]
    fn test_oversized_fragment_is_reported_once_and_resynchronises() {
        // Arrange
        let mut framer = LineFramer::with_max_frame_len(Some(4));

        // Act
        let overflow = framer.feed(b"abcdef");
        let tail = framer.feed(b"gh");
        let resumed = framer.feed(b"ij\nok\n");

        // Assert
        assert_eq!(
            overflow,
            vec![Err(FrameError::FrameTooLong { max: 4, discarded: 6 })]
        );
        assert!(tail.is_empty());
        assert_eq!(ok_frames(resumed), vec![b"ok".to_vec()]);
    }

    #[test]
    fn test_oversized_complete_line_is_rejected_but_neighbours_survive() {
        let mut framer = LineFramer::with_max_frame_len(Some(3));
        let frames = framer.feed(b"ok\ntoolong\nyes\n");
        assert_eq!(
            frames,
            vec![
                Ok(b"ok".to_vec()),
                Err(FrameError::FrameTooLong { max: 3, discarded: 7 }),
                Ok(b"yes".to_vec()),
            ]
        );
    }

    #[test]
    fn test_unbounded_framer_keeps_long_fragment() {
        let mut framer = LineFramer::with_max_frame_len(None);
        let big = vec![b'x'; 200_000];
        assert!(framer.feed(&big).is_empty());
        assert_eq!(framer.buffered_len(), 200_000);
    }

    #[test]
    fn test_take_remainder_empties_buffer() {
        let mut framer = LineFramer::new();
        framer.feed(b"done\npartial");
        assert_eq!(framer.take_remainder(), b"partial".to_vec());
        assert!(framer.is_empty());
    }
}
