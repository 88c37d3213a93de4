use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One occurrence reported by an agent CLI, discriminated by its `type` field.
///
/// Field names follow the harness wire format (`sessionId`, `toolCallId`, ...).
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HarnessEvent {
    TextDelta(TextDelta),
    ThinkingDelta(ThinkingDelta),
    ToolStart(ToolStart),
    ToolProgress(ToolProgress),
    ToolComplete(ToolComplete),
    PermissionRequest(PermissionRequested),
    Status(StatusMessage),
    Error(HarnessError),
}

impl HarnessEvent {
    pub fn session_id(&self) -> &str {
        match self {
            HarnessEvent::TextDelta(ev) => &ev.session_id,
            HarnessEvent::ThinkingDelta(ev) => &ev.session_id,
            HarnessEvent::ToolStart(ev) => &ev.session_id,
            HarnessEvent::ToolProgress(ev) => &ev.session_id,
            HarnessEvent::ToolComplete(ev) => &ev.session_id,
            HarnessEvent::PermissionRequest(ev) => &ev.session_id,
            HarnessEvent::Status(ev) => &ev.session_id,
            HarnessEvent::Error(ev) => &ev.session_id,
        }
    }

    /// Wire name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            HarnessEvent::TextDelta(_) => "text_delta",
            HarnessEvent::ThinkingDelta(_) => "thinking_delta",
            HarnessEvent::ToolStart(_) => "tool_start",
            HarnessEvent::ToolProgress(_) => "tool_progress",
            HarnessEvent::ToolComplete(_) => "tool_complete",
            HarnessEvent::PermissionRequest(_) => "permission_request",
            HarnessEvent::Status(_) => "status",
            HarnessEvent::Error(_) => "error",
        }
    }
}

/// Incremental assistant text.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextDelta {
    pub session_id: String,
    pub text: String,
}

/// Incremental reasoning text.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingDelta {
    pub session_id: String,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolStart {
    pub session_id: String,
    pub tool_call_id: String,
    pub name: String,
    /// Human-readable title when the harness provides one; defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Raw tool input. Anything but an object is forwarded as an empty argument map.
    #[serde(default)]
    pub input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Non-terminal status change for an open tool call.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolProgress {
    pub session_id: String,
    pub tool_call_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolComplete {
    pub session_id: String,
    pub tool_call_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Harness-specific status word; mapped onto the protocol lifecycle by the bridge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRequested {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub input: Value,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusMessage {
    pub session_id: String,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarnessError {
    pub session_id: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_wire_names() {
        let event: HarnessEvent = serde_json::from_value(json!({
            "type": "tool_start",
            "sessionId": "s1",
            "toolCallId": "tool-1",
            "name": "Read",
            "input": {"path": "src/lib.rs"}
        }))
        .unwrap();

        let HarnessEvent::ToolStart(start) = &event else {
            panic!("expected tool_start, got {event:?}");
        };
        assert_eq!(start.tool_call_id, "tool-1");
        assert_eq!(start.input["path"], "src/lib.rs");
        assert_eq!(start.status, None);
        assert_eq!(event.session_id(), "s1");
        assert_eq!(event.kind(), "tool_start");
    }

    #[test]
    fn optional_fields_default() {
        let event: HarnessEvent = serde_json::from_value(json!({
            "type": "tool_complete",
            "sessionId": "s1",
            "toolCallId": "tool-1"
        }))
        .unwrap();
        assert_eq!(
            event,
            HarnessEvent::ToolComplete(ToolComplete {
                session_id: "s1".to_string(),
                tool_call_id: "tool-1".to_string(),
                name: None,
                status: None,
                result: None,
            })
        );
    }

    #[test]
    fn unknown_kinds_and_missing_fields_fail() {
        assert!(serde_json::from_value::<HarnessEvent>(json!({"type": "mystery", "sessionId": "s"})).is_err());
        assert!(serde_json::from_value::<HarnessEvent>(json!({"type": "text_delta", "sessionId": "s"})).is_err());
    }
}
