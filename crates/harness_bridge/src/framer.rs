use std::collections::VecDeque;

use tracing::warn;

use crate::listeners::Listeners;

/// One `\n`-delimited segment cut out of the incoming byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Line {
        line_number: usize,
        bytes: Vec<u8>,
    },
    TooLong {
        line_number: usize,
        observed_bytes: usize,
        max_line_bytes: usize,
    },
}

/// Whether a line holds nothing but whitespace. The framer and the decoder share this rule.
pub(crate) fn is_blank(bytes: &[u8]) -> bool {
    String::from_utf8_lossy(bytes).trim().is_empty()
}

/// Byte-level splitter shared by the framer and the decoder.
///
/// Keeps the trailing partial segment across `push` calls. When bounded, a line that grows
/// past `max_line_bytes` stops being buffered and is reported as [`Segment::TooLong`] once
/// its terminating `\n` (or the end of the stream) arrives.
#[derive(Debug, Clone, Default)]
pub(crate) struct LineBuffer {
    current: Vec<u8>,
    max_line_bytes: Option<usize>,
    observed_bytes: usize,
    discard_mode: bool,
    line_number: usize,
}

impl LineBuffer {
    pub(crate) fn new(max_line_bytes: Option<usize>) -> Self {
        Self {
            max_line_bytes,
            ..Self::default()
        }
    }

    pub(crate) fn push(&mut self, chunk: &[u8], out: &mut Vec<Segment>) {
        let mut rest = chunk;
        while let Some(idx) = rest.iter().position(|b| *b == b'\n') {
            self.append(&rest[..idx]);
            out.push(self.finish_line());
            rest = &rest[idx + 1..];
        }
        self.append(rest);
    }

    /// Emits the unterminated remainder, if any, and resets the partial-line state.
    pub(crate) fn finish(&mut self) -> Option<Segment> {
        if self.discard_mode || !self.current.is_empty() {
            return Some(self.finish_line());
        }
        None
    }

    pub(crate) fn clear(&mut self) {
        self.reset_line_state();
    }

    pub(crate) fn has_partial(&self) -> bool {
        self.discard_mode || !self.current.is_empty()
    }

    fn append(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.observed_bytes = self.observed_bytes.saturating_add(bytes.len());
        if let Some(max) = self.max_line_bytes {
            if self.observed_bytes > max {
                if !self.discard_mode {
                    self.discard_mode = true;
                    self.current = Vec::new();
                }
                return;
            }
        }
        self.current.extend_from_slice(bytes);
    }

    fn finish_line(&mut self) -> Segment {
        self.line_number += 1;
        let line_number = self.line_number;

        if self.discard_mode {
            let observed_bytes = self.observed_bytes;
            let max_line_bytes = self.max_line_bytes.unwrap_or(observed_bytes);
            self.reset_line_state();
            return Segment::TooLong {
                line_number,
                observed_bytes,
                max_line_bytes,
            };
        }

        let bytes = std::mem::take(&mut self.current);
        self.reset_line_state();
        Segment::Line { line_number, bytes }
    }

    fn reset_line_state(&mut self) {
        self.current.clear();
        self.observed_bytes = 0;
        self.discard_mode = false;
    }
}

/// Turns arbitrary text chunks into trimmed, non-empty lines.
///
/// `write` emits every complete line through the registered `on_line` listeners unless the
/// framer is paused, in which case complete lines are held until `resume`. Framing never
/// fails; it only buffers.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: LineBuffer,
    ready: VecDeque<String>,
    paused: bool,
    listeners: Listeners<str>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds a single line. Longer lines are dropped with a warning.
    pub fn with_max_line_bytes(max_line_bytes: usize) -> Self {
        Self {
            buffer: LineBuffer::new(Some(max_line_bytes)),
            ..Self::default()
        }
    }

    pub fn on_line(&mut self, callback: impl FnMut(&str) + Send + 'static) {
        self.listeners.add(callback);
    }

    /// Appends a chunk and returns how many lines were emitted by this call.
    pub fn write(&mut self, chunk: impl AsRef<[u8]>) -> usize {
        let mut segments = Vec::new();
        self.buffer.push(chunk.as_ref(), &mut segments);
        self.enqueue(segments);
        if self.paused {
            return 0;
        }
        self.drain_ready()
    }

    /// Emits everything still buffered, including an unterminated final line, then resets.
    ///
    /// Stream end overrides the pause gate: nothing buffered is left behind.
    pub fn flush(&mut self) -> usize {
        let remainder = self.buffer.finish();
        self.enqueue(remainder);
        let emitted = self.drain_ready();
        self.buffer.clear();
        self.paused = false;
        emitted
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Lifts the gate and emits the complete lines that queued up while paused.
    pub fn resume(&mut self) -> usize {
        if !self.paused {
            return 0;
        }
        self.paused = false;
        self.drain_ready()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Complete lines waiting behind the pause gate.
    pub fn pending_lines(&self) -> usize {
        self.ready.len()
    }

    fn enqueue(&mut self, segments: impl IntoIterator<Item = Segment>) {
        for segment in segments {
            match segment {
                Segment::Line { bytes, .. } => {
                    let text = String::from_utf8_lossy(&bytes);
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        self.ready.push_back(trimmed.to_string());
                    }
                }
                Segment::TooLong {
                    line_number,
                    observed_bytes,
                    max_line_bytes,
                } => {
                    warn!(line_number, observed_bytes, max_line_bytes, "dropping over-long line");
                }
            }
        }
    }

    fn drain_ready(&mut self) -> usize {
        let mut emitted = 0;
        while let Some(line) = self.ready.pop_front() {
            self.listeners.emit(&line);
            emitted += 1;
        }
        emitted
    }
}
