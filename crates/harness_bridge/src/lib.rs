#![forbid(unsafe_code)]
//! Runtime bridge between agent CLI harnesses and a single session-update protocol.
//!
//! Raw stdout bytes flow through:
//! - [`LineFramer`] / [`NdjsonDecoder`]: framing and validated decoding of newline-delimited JSON.
//! - [`EventBridge`]: translation of [`HarnessEvent`]s into [`ProtocolUpdate`]s plus
//!   [`SideChannelEvent`]s (permission requests, truncation notices, errors).
//! - [`ConnectionStateMachine`] / [`PromptGuard`]: per-harness connection state and the
//!   one-prompt-at-a-time rule.
//!
//! [`HarnessSession`] wires one of each together for a single harness instance. Process
//! spawning, storage, and permission policy live outside this crate.

mod bridge;
mod config;
mod decoder;
mod error;
mod event;
mod framer;
mod listeners;
pub mod protocol;
mod reader;
mod session;
mod state;
mod validator;

pub use bridge::{EventBridge, Translation};
pub use config::{
    BridgeConfig, DecoderConfig, HarnessConfig, DEFAULT_HIGH_WATERMARK,
    DEFAULT_TOOL_RESULT_MAX_BYTES,
};
pub use decoder::{DecodeStats, DecodeSummary, InvalidEvent, MalformedLine, NdjsonDecoder};
pub use error::{BridgeError, DecodeError, DecodeErrorCode, PromptError, SchemaError};
pub use event::{
    HarnessError, HarnessEvent, PermissionRequested, StatusMessage, TextDelta, ThinkingDelta,
    ToolComplete, ToolProgress, ToolStart,
};
pub use framer::LineFramer;
pub use listeners::Listeners;
pub use protocol::{
    ContentChunk, ErrorNotice, PermissionRequest, ProtocolUpdate, SideChannelEvent, ToolCall,
    ToolCallStatus, ToolCallUpdate, ToolKind, ToolResultTruncated,
};
pub use reader::NdjsonReader;
pub use session::{HarnessSession, PermissionDecision, PermissionPolicy, SessionOutput};
pub use state::{ConnectionState, ConnectionStateMachine, PromptGuard, PromptPermit};
pub use validator::{EventValidator, SchemaValidator, SerdeValidator};

#[cfg(feature = "tokio")]
pub use reader::AsyncNdjsonReader;
