use std::io::Read;

use crate::decoder::{DecodeSummary, NdjsonDecoder};
use crate::error::BridgeError;
use crate::reader::CHUNK_SIZE_BYTES;
use crate::validator::EventValidator;

/// Pulls events out of a blocking byte source.
///
/// A new chunk is read only once the decoder queue is empty, so the pending queue never
/// grows past what one chunk can produce. `end()` runs exactly once, at EOF. A read error is
/// yielded once and ends iteration.
pub struct NdjsonReader<R: Read, V: EventValidator> {
    reader: R,
    decoder: NdjsonDecoder<V>,
    buffer: [u8; CHUNK_SIZE_BYTES],
    summary: DecodeSummary,
    done: bool,
}

impl<R: Read, V: EventValidator> NdjsonReader<R, V> {
    pub fn new(reader: R, decoder: NdjsonDecoder<V>) -> Self {
        Self {
            reader,
            decoder,
            buffer: [0u8; CHUNK_SIZE_BYTES],
            summary: DecodeSummary::default(),
            done: false,
        }
    }

    /// Running totals for everything decoded so far.
    pub fn summary(&self) -> DecodeSummary {
        self.summary
    }

    pub fn decoder(&self) -> &NdjsonDecoder<V> {
        &self.decoder
    }

    pub fn into_decoder(self) -> NdjsonDecoder<V> {
        self.decoder
    }

    fn fill(&mut self) -> Result<(), BridgeError> {
        loop {
            let read = match self.reader.read(&mut self.buffer) {
                Ok(read) => read,
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.done = true;
                    return Err(err.into());
                }
            };
            if read == 0 {
                self.done = true;
                let flushed = self.decoder.end();
                self.summary.absorb(flushed);
            } else {
                let pushed = self.decoder.push_chunk(&self.buffer[..read]);
                self.summary.absorb(pushed);
            }
            return Ok(());
        }
    }
}

impl<R: Read, V: EventValidator> Iterator for NdjsonReader<R, V> {
    type Item = Result<V::Event, BridgeError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.decoder.read_event() {
                return Some(Ok(event));
            }
            if self.done {
                return None;
            }
            if let Err(err) = self.fill() {
                return Some(Err(err));
            }
        }
    }
}
