use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

pub const DEFAULT_HIGH_WATERMARK: usize = 256;
pub const DEFAULT_TOOL_RESULT_MAX_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Pending-event count at which the decoder starts signalling backpressure.
    pub high_watermark: usize,
    /// Upper bound for a single line. `None` (the default) leaves lines unbounded so large
    /// tool results reach the bridge, which truncates them itself.
    pub max_line_bytes: Option<usize>,
}

impl DecoderConfig {
    pub fn with_high_watermark(mut self, high_watermark: usize) -> Self {
        self.high_watermark = high_watermark;
        self
    }

    pub fn with_max_line_bytes(mut self, max_line_bytes: Option<usize>) -> Self {
        self.max_line_bytes = max_line_bytes;
        self
    }

    pub(crate) fn effective_high_watermark(&self) -> usize {
        self.high_watermark.max(1)
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            high_watermark: DEFAULT_HIGH_WATERMARK,
            max_line_bytes: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Serialized tool results longer than this are cut before being forwarded.
    pub tool_result_max_bytes: usize,
}

impl BridgeConfig {
    pub fn with_tool_result_max_bytes(mut self, max: usize) -> Self {
        self.tool_result_max_bytes = max;
        self
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            tool_result_max_bytes: DEFAULT_TOOL_RESULT_MAX_BYTES,
        }
    }
}

/// Per-harness settings, loadable from a TOML document:
///
/// ```toml
/// [decoder]
/// high_watermark = 128
/// max_line_bytes = 8388608
///
/// [bridge]
/// tool_result_max_bytes = 32768
/// ```
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub decoder: DecoderConfig,
    pub bridge: BridgeConfig,
}

impl HarnessConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, BridgeError> {
        toml::from_str(raw).map_err(|source| BridgeError::Config { source })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, BridgeError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| BridgeError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }
}
