use std::collections::VecDeque;

use serde_json::Value;
use tracing::warn;

use crate::config::DecoderConfig;
use crate::error::{DecodeError, SchemaError};
use crate::framer::{is_blank, LineBuffer, Segment};
use crate::listeners::Listeners;
use crate::validator::EventValidator;

/// Per-call accounting returned by [`NdjsonDecoder::push_chunk`] and [`NdjsonDecoder::end`].
///
/// `parsed_count + malformed_line_count + invalid_event_count` equals the number of non-blank
/// lines completed by the call.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct DecodeSummary {
    pub parsed_count: usize,
    pub malformed_line_count: usize,
    pub invalid_event_count: usize,
    pub should_pause: bool,
}

impl DecodeSummary {
    pub fn lines_processed(&self) -> usize {
        self.parsed_count + self.malformed_line_count + self.invalid_event_count
    }

    pub(crate) fn absorb(&mut self, other: DecodeSummary) {
        self.parsed_count += other.parsed_count;
        self.malformed_line_count += other.malformed_line_count;
        self.invalid_event_count += other.invalid_event_count;
        self.should_pause = other.should_pause;
    }
}

/// A line that was not valid JSON (or was too long to buffer).
#[derive(Debug, Clone, PartialEq)]
pub struct MalformedLine {
    pub line_number: usize,
    /// Raw line text; empty for over-long lines, whose bytes were discarded.
    pub raw: String,
    pub error: DecodeError,
}

/// Valid JSON the validator rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidEvent {
    pub line_number: usize,
    pub raw: String,
    pub error: SchemaError,
}

/// Totals since construction.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct DecodeStats {
    pub parsed: usize,
    pub malformed: usize,
    pub invalid: usize,
}

/// Newline-delimited JSON decoder with a FIFO of accepted events.
///
/// Malformed and invalid lines are counted, reported, and skipped; they never stop decoding.
/// Backpressure is advisory: the queue is never trimmed, callers are expected to pause their
/// upstream while [`NdjsonDecoder::is_backpressured`] holds.
pub struct NdjsonDecoder<V: EventValidator> {
    validator: V,
    config: DecoderConfig,
    buffer: LineBuffer,
    pending: VecDeque<V::Event>,
    stats: DecodeStats,
    on_malformed: Listeners<MalformedLine>,
    on_invalid: Listeners<InvalidEvent>,
    on_event: Listeners<V::Event>,
}

impl<V: EventValidator> NdjsonDecoder<V> {
    pub fn new(validator: V, config: DecoderConfig) -> Self {
        Self {
            validator,
            buffer: LineBuffer::new(config.max_line_bytes),
            config,
            pending: VecDeque::new(),
            stats: DecodeStats::default(),
            on_malformed: Listeners::new(),
            on_invalid: Listeners::new(),
            on_event: Listeners::new(),
        }
    }

    pub fn on_malformed(&mut self, callback: impl FnMut(&MalformedLine) + Send + 'static) {
        self.on_malformed.add(callback);
    }

    pub fn on_invalid(&mut self, callback: impl FnMut(&InvalidEvent) + Send + 'static) {
        self.on_invalid.add(callback);
    }

    /// Fires synchronously for each accepted event, right after it is queued.
    pub fn on_event(&mut self, callback: impl FnMut(&V::Event) + Send + 'static) {
        self.on_event.add(callback);
    }

    pub fn push_chunk(&mut self, chunk: impl AsRef<[u8]>) -> DecodeSummary {
        let mut segments = Vec::new();
        self.buffer.push(chunk.as_ref(), &mut segments);

        let mut summary = DecodeSummary::default();
        for segment in segments {
            self.process_segment(segment, &mut summary);
        }
        summary.should_pause = self.is_backpressured();
        summary
    }

    /// Runs the unterminated trailing line, if any, through the same pipeline.
    ///
    /// Returns an all-zero summary when the trailing buffer was empty or blank.
    pub fn end(&mut self) -> DecodeSummary {
        let Some(segment) = self.buffer.finish() else {
            return DecodeSummary::default();
        };
        let mut summary = DecodeSummary::default();
        self.process_segment(segment, &mut summary);
        if summary.lines_processed() == 0 {
            return DecodeSummary::default();
        }
        summary.should_pause = self.is_backpressured();
        summary
    }

    pub fn read_event(&mut self) -> Option<V::Event> {
        self.pending.pop_front()
    }

    pub fn drain_events(&mut self) -> Vec<V::Event> {
        self.pending.drain(..).collect()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_backpressured(&self) -> bool {
        self.pending.len() >= self.config.effective_high_watermark()
    }

    /// Whether a partial line is buffered waiting for its `\n`.
    pub fn has_partial_line(&self) -> bool {
        self.buffer.has_partial()
    }

    /// Drops buffered partial text and every pending event.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.pending.clear();
    }

    pub fn stats(&self) -> DecodeStats {
        self.stats
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    fn process_segment(&mut self, segment: Segment, summary: &mut DecodeSummary) {
        match segment {
            Segment::TooLong {
                line_number,
                observed_bytes,
                max_line_bytes,
            } => {
                self.report_malformed(
                    MalformedLine {
                        line_number,
                        raw: String::new(),
                        error: DecodeError::LineTooLong {
                            line_number,
                            observed_bytes,
                            max_line_bytes,
                        },
                    },
                    summary,
                );
            }
            Segment::Line { line_number, bytes } => {
                if is_blank(&bytes) {
                    return;
                }
                self.process_line(line_number, &bytes, summary);
            }
        }
    }

    fn process_line(&mut self, line_number: usize, bytes: &[u8], summary: &mut DecodeSummary) {
        let value: Value = match serde_json::from_slice(bytes) {
            Ok(value) => value,
            Err(err) => {
                self.report_malformed(
                    MalformedLine {
                        line_number,
                        raw: raw_text(bytes),
                        error: DecodeError::Json {
                            line_number,
                            message: err.to_string(),
                        },
                    },
                    summary,
                );
                return;
            }
        };

        match self.validator.validate(value) {
            Ok(event) => {
                summary.parsed_count += 1;
                self.stats.parsed += 1;
                self.pending.push_back(event);
                if let Some(event) = self.pending.back() {
                    self.on_event.emit(event);
                }
            }
            Err(error) => {
                warn!(
                    line_number,
                    reason = %error.redacted_summary(),
                    "dropping event that failed validation"
                );
                summary.invalid_event_count += 1;
                self.stats.invalid += 1;
                self.on_invalid.emit(&InvalidEvent {
                    line_number,
                    raw: raw_text(bytes),
                    error,
                });
            }
        }
    }

    fn report_malformed(&mut self, malformed: MalformedLine, summary: &mut DecodeSummary) {
        warn!(
            line_number = malformed.error.line_number(),
            code = ?malformed.error.code(),
            "dropping malformed line"
        );
        summary.malformed_line_count += 1;
        self.stats.malformed += 1;
        self.on_malformed.emit(&malformed);
    }
}

impl<V: EventValidator> std::fmt::Debug for NdjsonDecoder<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NdjsonDecoder")
            .field("config", &self.config)
            .field("pending", &self.pending.len())
            .field("stats", &self.stats)
            .finish()
    }
}

fn raw_text(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let text: &str = &text;
    text.strip_suffix('\r').unwrap_or(text).to_string()
}
