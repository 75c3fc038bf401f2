//! Local monitor output: prints detected events instead of streaming them.

use std::io::{self, Write};

use keyrelay_core::detector::SinkError;
use keyrelay_core::{EventSink, KeyEvent};

/// Writes one line per event, e.g. `Ctrl+C pressed`.
pub struct ConsoleSink<W = io::Stdout> {
    out: W,
}

impl ConsoleSink {
    /// A sink that prints to stdout.
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> EventSink for ConsoleSink<W> {
    fn deliver(&mut self, event: KeyEvent) -> Result<(), SinkError> {
        writeln!(self.out, "{event}")
            .and_then(|()| self.out.flush())
            .map_err(|e| SinkError::Failed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyrelay_core::{KeyState, Modifier, ModifierSet};

    #[test]
    fn test_console_sink_writes_one_line_per_event() {
        let mut sink = ConsoleSink::new(Vec::new());

        sink.deliver(KeyEvent::at(
            "C",
            KeyState::Pressed,
            ModifierSet::empty().with(Modifier::Ctrl),
            0.0,
        ))
        .unwrap();
        sink.deliver(KeyEvent::at("C", KeyState::Released, ModifierSet::empty(), 0.0))
            .unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(text, "Ctrl+C pressed\nC released\n");
    }
}
