use std::borrow::Cow;
use std::collections::{HashMap, VecDeque};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::BridgeConfig;
use crate::event::{HarnessEvent, PermissionRequested, ToolComplete, ToolProgress, ToolStart};
use crate::listeners::Listeners;
use crate::protocol::{
    arguments_from, ContentChunk, ErrorNotice, PermissionRequest, ProtocolUpdate, SideChannelEvent,
    ToolCall, ToolCallStatus, ToolCallUpdate, ToolKind, ToolResultTruncated,
};

/// How many closed tool calls are remembered so a repeated completion cannot reopen them.
const CLOSED_TOOL_CALL_HISTORY: usize = 256;

/// In-flight tool call, kept until its terminal status has been emitted.
#[derive(Debug, Clone, PartialEq)]
struct ToolCallRecord {
    name: Option<String>,
    kind: ToolKind,
    arguments: Map<String, Value>,
    status: ToolCallStatus,
}

impl ToolCallRecord {
    /// Stand-in for a tool call whose start was never observed.
    fn synthetic(name: Option<String>) -> Self {
        let kind = name.as_deref().map(ToolKind::infer).unwrap_or(ToolKind::Other);
        Self {
            name,
            kind,
            arguments: Map::new(),
            status: ToolCallStatus::Pending,
        }
    }
}

/// Result of translating one harness event.
///
/// Exactly one of `update` or the first notice is the event's primary outcome; a
/// `ToolResultTruncated` notice may accompany a `ToolCallUpdate`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Translation {
    pub update: Option<ProtocolUpdate>,
    pub notices: Vec<SideChannelEvent>,
}

impl Translation {
    fn update(update: ProtocolUpdate) -> Self {
        Self {
            update: Some(update),
            notices: Vec::new(),
        }
    }

    fn notice(notice: SideChannelEvent) -> Self {
        Self {
            update: None,
            notices: vec![notice],
        }
    }

    fn error(session_id: Option<&str>, message: impl Into<String>) -> Self {
        Self::notice(SideChannelEvent::Error(ErrorNotice {
            session_id: session_id.map(str::to_string),
            message: message.into(),
        }))
    }
}

/// Translates harness-native events into protocol updates and side-channel notices.
///
/// Never fails: events that cannot be mapped become `Error` notices. Performs no I/O.
#[derive(Debug, Default)]
pub struct EventBridge {
    config: BridgeConfig,
    records: HashMap<String, ToolCallRecord>,
    closed: HashMap<String, ToolCallRecord>,
    closed_order: VecDeque<String>,
    on_update: Listeners<ProtocolUpdate>,
    on_notice: Listeners<SideChannelEvent>,
}

impl EventBridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn on_update(&mut self, callback: impl FnMut(&ProtocolUpdate) + Send + 'static) {
        self.on_update.add(callback);
    }

    pub fn on_notice(&mut self, callback: impl FnMut(&SideChannelEvent) + Send + 'static) {
        self.on_notice.add(callback);
    }

    /// Number of tool calls started but not yet terminal.
    pub fn open_tool_calls(&self) -> usize {
        self.records.len()
    }

    /// Forgets every open and recently closed tool call.
    pub fn reset(&mut self) {
        self.records.clear();
        self.closed.clear();
        self.closed_order.clear();
    }

    /// Decodes a raw JSON event first; shape errors become an `Error` notice.
    pub fn translate_value(&mut self, value: Value) -> Translation {
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .map(str::to_string);
        match serde_json::from_value::<HarnessEvent>(value) {
            Ok(event) => self.translate(event),
            Err(err) => {
                warn!(error = %err, "harness event does not match any known shape");
                let translation = Translation::error(
                    session_id.as_deref(),
                    format!("unrecognized harness event: {err}"),
                );
                self.dispatch(&translation);
                translation
            }
        }
    }

    pub fn translate(&mut self, event: HarnessEvent) -> Translation {
        let translation = self.map_event(event);
        self.dispatch(&translation);
        translation
    }

    fn dispatch(&mut self, translation: &Translation) {
        if let Some(update) = &translation.update {
            self.on_update.emit(update);
        }
        for notice in &translation.notices {
            self.on_notice.emit(notice);
        }
    }

    fn map_event(&mut self, event: HarnessEvent) -> Translation {
        match event {
            HarnessEvent::TextDelta(delta) => {
                Translation::update(ProtocolUpdate::AgentMessageChunk(ContentChunk {
                    session_id: delta.session_id,
                    text: delta.text,
                }))
            }
            HarnessEvent::ThinkingDelta(delta) => {
                Translation::update(ProtocolUpdate::AgentThoughtChunk(ContentChunk {
                    session_id: delta.session_id,
                    text: delta.text,
                }))
            }
            HarnessEvent::ToolStart(start) => self.tool_start(start),
            HarnessEvent::ToolProgress(progress) => self.tool_progress(progress),
            HarnessEvent::ToolComplete(complete) => self.tool_complete(complete),
            HarnessEvent::PermissionRequest(request) => self.permission_request(request),
            HarnessEvent::Status(status) => {
                Translation::notice(SideChannelEvent::Status(ContentChunk {
                    session_id: status.session_id,
                    text: status.message,
                }))
            }
            HarnessEvent::Error(error) => Translation::error(Some(&error.session_id), error.message),
        }
    }

    fn tool_start(&mut self, start: ToolStart) -> Translation {
        if start.tool_call_id.is_empty() {
            warn!(session_id = %start.session_id, "tool_start without toolCallId");
            return Translation::error(Some(&start.session_id), "tool_start is missing toolCallId");
        }

        let status = match ToolCallStatus::from_harness(start.status.as_deref()) {
            ToolCallStatus::Pending => ToolCallStatus::Pending,
            _ => ToolCallStatus::Running,
        };
        let kind = ToolKind::infer(&start.name);
        let arguments = arguments_from(start.input);
        let title = start.title.unwrap_or_else(|| start.name.clone());

        debug!(tool_call_id = %start.tool_call_id, name = %start.name, ?kind, "tool call opened");
        self.forget_closed(&start.tool_call_id);
        self.records.insert(
            start.tool_call_id.clone(),
            ToolCallRecord {
                name: Some(start.name),
                kind,
                arguments: arguments.clone(),
                status,
            },
        );

        Translation::update(ProtocolUpdate::ToolCall(ToolCall {
            session_id: start.session_id,
            tool_call_id: start.tool_call_id,
            title,
            kind,
            status,
            raw_input: arguments,
        }))
    }

    fn tool_progress(&mut self, progress: ToolProgress) -> Translation {
        if progress.tool_call_id.is_empty() {
            return Translation::error(
                Some(&progress.session_id),
                "tool_progress is missing toolCallId",
            );
        }

        let reported = match ToolCallStatus::from_harness(progress.status.as_deref()) {
            ToolCallStatus::Pending => ToolCallStatus::Pending,
            _ => ToolCallStatus::Running,
        };
        let record: &ToolCallRecord = match self.closed.get(&progress.tool_call_id) {
            Some(closed) => closed,
            None => {
                let record = self
                    .records
                    .entry(progress.tool_call_id.clone())
                    .or_insert_with(|| ToolCallRecord::synthetic(None));
                record.status = record.status.advance(reported);
                &*record
            }
        };

        Translation::update(ProtocolUpdate::ToolCallUpdate(ToolCallUpdate {
            session_id: progress.session_id,
            tool_call_id: progress.tool_call_id,
            title: record.name.clone(),
            kind: record.kind,
            status: record.status,
            raw_output: None,
        }))
    }

    fn tool_complete(&mut self, complete: ToolComplete) -> Translation {
        if complete.tool_call_id.is_empty() {
            warn!(session_id = %complete.session_id, "tool_complete without toolCallId");
            return Translation::error(
                Some(&complete.session_id),
                "tool_complete is missing toolCallId",
            );
        }

        let mut record = match self.records.remove(&complete.tool_call_id) {
            Some(record) => record,
            None => match self.closed.get(&complete.tool_call_id) {
                Some(closed) => {
                    debug!(
                        tool_call_id = %complete.tool_call_id,
                        "repeated tool_complete for closed call"
                    );
                    closed.clone()
                }
                None => {
                    warn!(
                        tool_call_id = %complete.tool_call_id,
                        "tool_complete without a matching tool_start; synthesizing record"
                    );
                    ToolCallRecord::synthetic(complete.name.clone())
                }
            },
        };
        if record.name.is_none() {
            if let Some(name) = complete.name {
                record.kind = ToolKind::infer(&name);
                record.name = Some(name);
            }
        }
        record.status = record
            .status
            .advance(ToolCallStatus::from_harness(complete.status.as_deref()));

        let mut notices = Vec::new();
        let raw_output = complete.result.map(|result| {
            let (output, original_bytes) = self.cap_result(result);
            if let Some(original_bytes) = original_bytes {
                debug!(
                    tool_call_id = %complete.tool_call_id,
                    original_bytes,
                    max_bytes = self.config.tool_result_max_bytes,
                    "tool result truncated"
                );
                notices.push(SideChannelEvent::ToolResultTruncated(ToolResultTruncated {
                    session_id: complete.session_id.clone(),
                    tool_call_id: complete.tool_call_id.clone(),
                    original_bytes,
                    max_bytes: self.config.tool_result_max_bytes,
                }));
            }
            output
        });

        let update = ToolCallUpdate {
            session_id: complete.session_id,
            tool_call_id: complete.tool_call_id.clone(),
            title: record.name.clone(),
            kind: record.kind,
            status: record.status,
            raw_output,
        };

        if record.status.is_terminal() {
            debug!(tool_call_id = %complete.tool_call_id, status = ?record.status, "tool call closed");
            self.remember_closed(complete.tool_call_id, record);
        } else {
            self.records.insert(complete.tool_call_id, record);
        }

        Translation {
            update: Some(ProtocolUpdate::ToolCallUpdate(update)),
            notices,
        }
    }

    fn permission_request(&mut self, request: PermissionRequested) -> Translation {
        let record = request
            .tool_call_id
            .as_deref()
            .and_then(|id| self.records.get(id));

        let tool_name = request
            .tool_name
            .or_else(|| record.and_then(|record| record.name.clone()));
        let kind = match (&tool_name, record) {
            (Some(name), _) => ToolKind::infer(name),
            (None, Some(record)) => record.kind,
            (None, None) => ToolKind::Other,
        };
        let arguments = match request.input {
            Value::Object(map) => map,
            _ => record
                .map(|record| record.arguments.clone())
                .unwrap_or_default(),
        };

        Translation::notice(SideChannelEvent::PermissionRequest(PermissionRequest {
            session_id: request.session_id,
            request_id: request.request_id,
            tool_call_id: request.tool_call_id,
            tool_name,
            kind,
            arguments,
        }))
    }

    fn remember_closed(&mut self, tool_call_id: String, record: ToolCallRecord) {
        if self.closed.insert(tool_call_id.clone(), record).is_some() {
            return;
        }
        self.closed_order.push_back(tool_call_id);
        if self.closed_order.len() > CLOSED_TOOL_CALL_HISTORY {
            if let Some(evicted) = self.closed_order.pop_front() {
                self.closed.remove(&evicted);
            }
        }
    }

    fn forget_closed(&mut self, tool_call_id: &str) {
        if self.closed.remove(tool_call_id).is_some() {
            self.closed_order.retain(|closed| closed != tool_call_id);
        }
    }

    /// Returns the value to forward and, when cut, the original serialized size.
    fn cap_result(&self, result: Value) -> (Value, Option<usize>) {
        let max = self.config.tool_result_max_bytes;
        let cut = {
            let text: Cow<'_, str> = match &result {
                Value::String(text) => Cow::Borrowed(text.as_str()),
                other => Cow::Owned(other.to_string()),
            };
            if text.len() <= max {
                None
            } else {
                let mut end = max;
                while !text.is_char_boundary(end) {
                    end -= 1;
                }
                Some((text[..end].to_string(), text.len()))
            }
        };

        match cut {
            None => (result, None),
            Some((prefix, original)) => (Value::String(prefix), Some(original)),
        }
    }
}
