//! Normalized session-update vocabulary shared by every harness.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Read,
    Execute,
    Search,
    Other,
}

impl ToolKind {
    /// Best-effort classification from a tool name.
    pub fn infer(name: &str) -> Self {
        let name = name.to_ascii_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|needle| name.contains(needle));

        if has(&["bash", "shell", "exec", "command", "terminal", "run"]) {
            ToolKind::Execute
        } else if has(&["grep", "search", "find", "glob", "list", "ls"]) {
            ToolKind::Search
        } else if has(&["read", "view", "cat", "open", "fetch"]) {
            ToolKind::Read
        } else {
            ToolKind::Other
        }
    }
}

/// Tool-call lifecycle. Status only moves forward: pending, running, then a terminal state.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl ToolCallStatus {
    /// Maps a harness status word. Unrecognized or absent words map to `Pending`.
    pub fn from_harness(status: Option<&str>) -> Self {
        let Some(status) = status else {
            return ToolCallStatus::Pending;
        };
        match status.trim().to_ascii_lowercase().as_str() {
            "running" | "in_progress" | "started" | "executing" => ToolCallStatus::Running,
            "completed" | "complete" | "succeeded" | "success" | "ok" | "done" => {
                ToolCallStatus::Succeeded
            }
            "failed" | "failure" | "error" | "errored" | "cancelled" | "canceled" | "denied"
            | "rejected" => ToolCallStatus::Failed,
            _ => ToolCallStatus::Pending,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ToolCallStatus::Succeeded | ToolCallStatus::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            ToolCallStatus::Pending => 0,
            ToolCallStatus::Running => 1,
            ToolCallStatus::Succeeded | ToolCallStatus::Failed => 2,
        }
    }

    /// Returns `next` unless it would move the lifecycle backwards.
    pub fn advance(self, next: ToolCallStatus) -> ToolCallStatus {
        if next.rank() >= self.rank() {
            next
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    pub session_id: String,
    pub tool_call_id: String,
    pub title: String,
    pub kind: ToolKind,
    pub status: ToolCallStatus,
    pub raw_input: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallUpdate {
    pub session_id: String,
    pub tool_call_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub kind: ToolKind,
    pub status: ToolCallStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<Value>,
}

/// Primary output of the bridge, consumed by session storage and UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "sessionUpdate", rename_all = "snake_case")]
pub enum ProtocolUpdate {
    AgentMessageChunk(ContentChunk),
    AgentThoughtChunk(ContentChunk),
    ToolCall(ToolCall),
    ToolCallUpdate(ToolCallUpdate),
}

impl ProtocolUpdate {
    pub fn session_id(&self) -> &str {
        match self {
            ProtocolUpdate::AgentMessageChunk(chunk) | ProtocolUpdate::AgentThoughtChunk(chunk) => {
                &chunk.session_id
            }
            ProtocolUpdate::ToolCall(call) => &call.session_id,
            ProtocolUpdate::ToolCallUpdate(update) => &update.session_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentChunk {
    pub session_id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRequest {
    pub session_id: String,
    pub request_id: Option<String>,
    pub tool_call_id: Option<String>,
    pub tool_name: Option<String>,
    pub kind: ToolKind,
    pub arguments: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResultTruncated {
    pub session_id: String,
    pub tool_call_id: String,
    pub original_bytes: usize,
    pub max_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorNotice {
    /// Absent when the failing event was too broken to carry a session id.
    pub session_id: Option<String>,
    pub message: String,
}

/// Notifications that travel beside the primary update stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum SideChannelEvent {
    PermissionRequest(PermissionRequest),
    ToolResultTruncated(ToolResultTruncated),
    Status(ContentChunk),
    Error(ErrorNotice),
}

/// Converts raw tool input into an argument map; non-objects become an empty map.
pub fn arguments_from(input: Value) -> Map<String, Value> {
    match input {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
