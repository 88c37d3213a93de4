mod sync;

#[cfg(feature = "tokio")]
mod tokio;

pub use sync::NdjsonReader;

#[cfg(feature = "tokio")]
pub use self::tokio::AsyncNdjsonReader;

pub(crate) const CHUNK_SIZE_BYTES: usize = 8192;
