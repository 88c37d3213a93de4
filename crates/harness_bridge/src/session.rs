use std::future::Future;

use tracing::debug;

use crate::bridge::{EventBridge, Translation};
use crate::config::HarnessConfig;
use crate::decoder::{DecodeSummary, NdjsonDecoder};
use crate::error::PromptError;
use crate::event::HarnessEvent;
use crate::protocol::{PermissionRequest, ProtocolUpdate, SideChannelEvent};
use crate::state::{ConnectionState, ConnectionStateMachine, PromptGuard};
use crate::validator::SerdeValidator;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum PermissionDecision {
    Allow,
    Ask,
    Deny,
}

/// Decides what happens to a tool permission request. Consulted synchronously; the bridge
/// itself never waits on it.
pub trait PermissionPolicy: Send {
    fn decide(&mut self, request: &PermissionRequest) -> PermissionDecision;
}

impl<F> PermissionPolicy for F
where
    F: FnMut(&PermissionRequest) -> PermissionDecision + Send,
{
    fn decide(&mut self, request: &PermissionRequest) -> PermissionDecision {
        self(request)
    }
}

/// Everything produced by one [`HarnessSession::ingest`] or [`HarnessSession::finish`] call,
/// in arrival order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionOutput {
    pub updates: Vec<ProtocolUpdate>,
    pub notices: Vec<SideChannelEvent>,
    pub permission_decisions: Vec<(PermissionRequest, PermissionDecision)>,
    /// Decode counts for the call. `should_pause` reflects the decoder queue after the session
    /// drained it, not the transient backlog inside the call.
    pub summary: DecodeSummary,
}

impl SessionOutput {
    fn absorb(&mut self, translation: Translation) {
        self.updates.extend(translation.update);
        self.notices.extend(translation.notices);
    }
}

/// One harness instance: its own decoder, bridge, connection state and prompt guard.
pub struct HarnessSession {
    name: String,
    decoder: NdjsonDecoder<SerdeValidator<HarnessEvent>>,
    bridge: EventBridge,
    connection: ConnectionStateMachine,
    prompt: PromptGuard,
    policy: Option<Box<dyn PermissionPolicy>>,
}

impl HarnessSession {
    pub fn new(name: impl Into<String>, config: HarnessConfig) -> Self {
        Self {
            name: name.into(),
            decoder: NdjsonDecoder::new(SerdeValidator::new(), config.decoder),
            bridge: EventBridge::new(config.bridge),
            connection: ConnectionStateMachine::new(),
            prompt: PromptGuard::new(),
            policy: None,
        }
    }

    pub fn with_permission_policy(mut self, policy: impl PermissionPolicy + 'static) -> Self {
        self.policy = Some(Box::new(policy));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// For registering connection-change listeners.
    pub fn connection_mut(&mut self) -> &mut ConnectionStateMachine {
        &mut self.connection
    }

    /// For registering update and notice listeners.
    pub fn bridge_mut(&mut self) -> &mut EventBridge {
        &mut self.bridge
    }

    /// For registering malformed/invalid line listeners.
    pub fn decoder_mut(&mut self) -> &mut NdjsonDecoder<SerdeValidator<HarnessEvent>> {
        &mut self.decoder
    }

    pub fn connect(&mut self) {
        self.connection.transition(ConnectionState::Connected);
    }

    pub fn disconnect(&mut self) {
        self.connection.transition(ConnectionState::Disconnected);
    }

    pub fn fail(&mut self) {
        self.connection.transition(ConnectionState::Error);
    }

    /// Decodes a stdout chunk and translates every event it completes.
    pub fn ingest(&mut self, chunk: impl AsRef<[u8]>) -> SessionOutput {
        let summary = self.decoder.push_chunk(chunk);
        self.translate_pending(summary)
    }

    /// Flushes the trailing unterminated line at stream end.
    pub fn finish(&mut self) -> SessionOutput {
        let summary = self.decoder.end();
        self.translate_pending(summary)
    }

    /// Feeds an event from a non-NDJSON transport (for example a local IPC hook).
    pub fn deliver(&mut self, event: HarnessEvent) -> SessionOutput {
        let mut output = SessionOutput::default();
        let translation = self.bridge.translate(event);
        self.apply_policy(&translation, &mut output);
        output.absorb(translation);
        output
    }

    /// Runs one prompt round-trip; fails fast if another prompt is in flight.
    pub async fn prompt<F, Fut, T, E>(&self, work: F) -> Result<T, PromptError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        debug!(harness = %self.name, "prompt requested");
        self.prompt.run(work).await
    }

    pub fn is_prompting(&self) -> bool {
        self.prompt.is_busy()
    }

    /// Drops buffered output and open tool calls, e.g. after the child process was killed.
    pub fn reset(&mut self) {
        self.decoder.clear();
        self.bridge.reset();
    }

    fn translate_pending(&mut self, summary: DecodeSummary) -> SessionOutput {
        let mut output = SessionOutput {
            summary,
            ..SessionOutput::default()
        };
        for event in self.decoder.drain_events() {
            let translation = self.bridge.translate(event);
            self.apply_policy(&translation, &mut output);
            output.absorb(translation);
        }
        output.summary.should_pause = self.decoder.is_backpressured();
        output
    }

    fn apply_policy(&mut self, translation: &Translation, output: &mut SessionOutput) {
        let Some(policy) = self.policy.as_mut() else {
            return;
        };
        for notice in &translation.notices {
            if let SideChannelEvent::PermissionRequest(request) = notice {
                let decision = policy.decide(request);
                debug!(harness = %self.name, ?decision, "permission decided");
                output.permission_decisions.push((request.clone(), decision));
            }
        }
    }
}

impl std::fmt::Debug for HarnessSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HarnessSession")
            .field("name", &self.name)
            .field("state", &self.connection.state())
            .field("decoder", &self.decoder)
            .field("open_tool_calls", &self.bridge.open_tool_calls())
            .field("has_policy", &self.policy.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ToolCallStatus, ToolKind};

    #[test]
    fn ingest_translates_in_arrival_order() {
        let mut session = HarnessSession::new("cursor", HarnessConfig::default());
        let output = session.ingest(concat!(
            "{\"type\":\"text_delta\",\"sessionId\":\"s\",\"text\":\"Hel\"}\n",
            "{\"type\":\"thinking_delta\",\"sessionId\":\"s\",\"text\":\"hmm\"}\n",
            "{\"type\":\"tool_start\",\"sessionId\":\"s\",\"toolCallId\":\"t1\",\"name\":\"Read\"}\n",
            "{\"type\":\"tool_complete\",\"sessionId\":\"s\",\"toolCallId\":\"t1\",\"status\":\"completed\"}\n",
        ));

        assert_eq!(output.summary.parsed_count, 4);
        let kinds: Vec<_> = output
            .updates
            .iter()
            .map(|update| match update {
                ProtocolUpdate::AgentMessageChunk(_) => "message",
                ProtocolUpdate::AgentThoughtChunk(_) => "thought",
                ProtocolUpdate::ToolCall(_) => "tool_call",
                ProtocolUpdate::ToolCallUpdate(_) => "tool_call_update",
            })
            .collect();
        assert_eq!(kinds, vec!["message", "thought", "tool_call", "tool_call_update"]);
    }

    #[test]
    fn should_pause_reflects_the_drained_queue() {
        let config = HarnessConfig {
            decoder: crate::config::DecoderConfig::default().with_high_watermark(1),
            ..HarnessConfig::default()
        };
        let mut session = HarnessSession::new("claude", config);
        let output = session.ingest("{\"type\":\"text_delta\",\"sessionId\":\"s\",\"text\":\"hi\"}\n");
        assert_eq!(output.summary.parsed_count, 1);
        assert!(!output.summary.should_pause);
        assert!(!session.decoder_mut().is_backpressured());
    }

    #[test]
    fn oversized_tool_result_is_truncated_not_dropped() {
        let mut session = HarnessSession::new("claude", HarnessConfig::default());
        session.ingest(
            "{\"type\":\"tool_start\",\"sessionId\":\"s\",\"toolCallId\":\"t1\",\"name\":\"Read\"}\n",
        );

        let result = "x".repeat(1_100_000);
        let line = serde_json::json!({
            "type": "tool_complete",
            "sessionId": "s",
            "toolCallId": "t1",
            "status": "completed",
            "result": result,
        });
        let output = session.ingest(format!("{line}\n"));

        assert_eq!(output.summary.malformed_line_count, 0);
        let [ProtocolUpdate::ToolCallUpdate(update)] = output.updates.as_slice() else {
            panic!("expected a single tool call update, got {} updates", output.updates.len());
        };
        assert_eq!(update.status, ToolCallStatus::Succeeded);
        let forwarded = update.raw_output.as_ref().and_then(serde_json::Value::as_str);
        assert_eq!(forwarded.map(str::len), Some(crate::config::DEFAULT_TOOL_RESULT_MAX_BYTES));
        assert!(matches!(
            output.notices.as_slice(),
            [SideChannelEvent::ToolResultTruncated(truncated)] if truncated.original_bytes == 1_100_000
        ));
        assert_eq!(session.bridge_mut().open_tool_calls(), 0);
    }

    #[test]
    fn unknown_kinds_are_counted_invalid() {
        let mut session = HarnessSession::new("claude", HarnessConfig::default());
        let output = session.ingest("{\"type\":\"mystery\",\"sessionId\":\"s\"}\nnot json\n");
        assert_eq!(output.summary.invalid_event_count, 1);
        assert_eq!(output.summary.malformed_line_count, 1);
        assert!(output.updates.is_empty());
        assert!(output.notices.is_empty());
    }

    #[test]
    fn policy_sees_permission_requests() {
        let mut session = HarnessSession::new("claude", HarnessConfig::default())
            .with_permission_policy(|request: &PermissionRequest| match request.kind {
                ToolKind::Execute => PermissionDecision::Ask,
                _ => PermissionDecision::Allow,
            });

        let output = session.ingest(concat!(
            "{\"type\":\"tool_start\",\"sessionId\":\"s\",\"toolCallId\":\"t1\",\"name\":\"Bash\",\"input\":{\"command\":\"make\"}}\n",
            "{\"type\":\"permission_request\",\"sessionId\":\"s\",\"toolCallId\":\"t1\"}\n",
        ));
        assert_eq!(output.updates.len(), 1);
        assert_eq!(output.notices.len(), 1);
        assert_eq!(output.permission_decisions.len(), 1);
        assert_eq!(output.permission_decisions[0].1, PermissionDecision::Ask);
        assert_eq!(output.permission_decisions[0].0.tool_name.as_deref(), Some("Bash"));
    }

    #[test]
    fn finish_flushes_trailing_event_and_reset_forgets_tools() {
        let mut session = HarnessSession::new("gemini", HarnessConfig::default());
        let output = session
            .ingest("{\"type\":\"tool_start\",\"sessionId\":\"s\",\"toolCallId\":\"t1\",\"name\":\"Grep\",\"status\":\"running\"}");
        assert!(output.updates.is_empty());

        let output = session.finish();
        let Some(ProtocolUpdate::ToolCall(call)) = output.updates.first() else {
            panic!("expected tool call, got {output:?}");
        };
        assert_eq!(call.status, ToolCallStatus::Running);
        assert_eq!(call.kind, ToolKind::Search);

        session.reset();
        assert_eq!(session.bridge_mut().open_tool_calls(), 0);
    }

    #[test]
    fn delivered_events_skip_the_decoder() {
        let mut session = HarnessSession::new("cursor", HarnessConfig::default())
            .with_permission_policy(|_: &PermissionRequest| PermissionDecision::Deny);
        let output = session.deliver(HarnessEvent::PermissionRequest(
            crate::event::PermissionRequested {
                session_id: "s".to_string(),
                request_id: None,
                tool_call_id: None,
                tool_name: Some("Write".to_string()),
                input: serde_json::json!({"path": "a.txt"}),
            },
        ));
        assert!(output.updates.is_empty());
        assert_eq!(output.summary, DecodeSummary::default());
        assert_eq!(output.permission_decisions[0].1, PermissionDecision::Deny);
        assert_eq!(output.permission_decisions[0].0.arguments["path"], "a.txt");
    }

    #[test]
    fn connection_transitions_follow_calls() {
        let mut session = HarnessSession::new("codex", HarnessConfig::default());
        assert_eq!(session.state(), ConnectionState::Disconnected);
        session.connect();
        assert_eq!(session.state(), ConnectionState::Connected);
        session.fail();
        assert_eq!(session.state(), ConnectionState::Error);
        session.disconnect();
        assert_eq!(session.state(), ConnectionState::Disconnected);
    }
}
