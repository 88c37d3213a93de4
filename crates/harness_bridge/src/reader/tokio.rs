use tokio::io::{AsyncRead, AsyncReadExt};

use crate::decoder::{DecodeSummary, NdjsonDecoder};
use crate::error::BridgeError;
use crate::reader::CHUNK_SIZE_BYTES;
use crate::validator::EventValidator;

/// Async counterpart of [`crate::NdjsonReader`] for child-process pipes.
pub struct AsyncNdjsonReader<R: AsyncRead + Unpin, V: EventValidator> {
    reader: R,
    decoder: NdjsonDecoder<V>,
    buffer: Vec<u8>,
    summary: DecodeSummary,
    done: bool,
}

impl<R: AsyncRead + Unpin, V: EventValidator> AsyncNdjsonReader<R, V> {
    pub fn new(reader: R, decoder: NdjsonDecoder<V>) -> Self {
        Self {
            reader,
            decoder,
            buffer: vec![0u8; CHUNK_SIZE_BYTES],
            summary: DecodeSummary::default(),
            done: false,
        }
    }

    pub fn summary(&self) -> DecodeSummary {
        self.summary
    }

    pub fn into_decoder(self) -> NdjsonDecoder<V> {
        self.decoder
    }

    /// Next accepted event; `None` once the source is exhausted and the queue is empty.
    pub async fn next_event(&mut self) -> Option<Result<V::Event, BridgeError>> {
        loop {
            if let Some(event) = self.decoder.read_event() {
                return Some(Ok(event));
            }
            if self.done {
                return None;
            }
            match self.reader.read(&mut self.buffer).await {
                Ok(0) => {
                    self.done = true;
                    let flushed = self.decoder.end();
                    self.summary.absorb(flushed);
                }
                Ok(read) => {
                    let pushed = self.decoder.push_chunk(&self.buffer[..read]);
                    self.summary.absorb(pushed);
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(err.into()));
                }
            }
        }
    }
}
