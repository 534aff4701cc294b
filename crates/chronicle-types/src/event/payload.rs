use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::{BlobId, EventId, SessionId, ToolCallId};
use crate::message::{ContentBlock, StopReason};
use crate::usage::TokenUsage;

use super::kind::EventType;

// NOTE: Payload Schema Stability
//
// Payloads are the externally visible JSON shape of the event log: RPC
// consumers, streaming clients and future migrations all read them. Field
// names are camelCase and additions must be backward compatible (new fields
// optional with serde defaults). The `type` column of the event row, not a
// tag inside the payload, selects the schema.

/// `session.start`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStartPayload {
    pub working_directory: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// Reason a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEndReason {
    Completed,
    Aborted,
    Error,
    Timeout,
}

/// `session.end`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEndPayload {
    pub reason: SessionEndReason,
}

/// `session.fork`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionForkPayload {
    pub source_session_id: SessionId,
    pub source_event_id: EventId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// User message content: plain text or structured blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl UserContent {
    /// Flatten to content blocks for the projection.
    pub fn to_blocks(&self) -> Vec<ContentBlock> {
        match self {
            UserContent::Text(text) => vec![ContentBlock::Text { text: text.clone() }],
            UserContent::Blocks(blocks) => blocks.clone(),
        }
    }

    /// Concatenated text content (for FTS extraction).
    pub fn text(&self) -> String {
        match self {
            UserContent::Text(text) => text.clone(),
            UserContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// `message.user`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMessagePayload {
    pub content: UserContent,
    pub turn: u32,
}

/// `message.assistant`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantMessagePayload {
    pub content: Vec<ContentBlock>,
    pub turn: u32,
    pub model: String,
    pub stop_reason: StopReason,
    pub token_usage: TokenUsage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_thinking: Option<bool>,
}

/// `message.deleted` — tombstone that hides the target during reconstruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDeletedPayload {
    pub target_event_id: EventId,
    pub target_type: EventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_turn: Option<u32>,
    pub reason: String,
}

/// `tool.call`
///
/// Named with the `Event` infix to keep it distinct from the in-message
/// `tool_use` content block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallEventPayload {
    pub tool_call_id: ToolCallId,
    pub name: String,
    pub arguments: Value,
    pub turn: u32,
}

/// `tool.result`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResultPayload {
    pub tool_call_id: ToolCallId,
    pub content: String,
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_id: Option<BlobId>,
}

/// `config.model_switch`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigModelSwitchPayload {
    pub previous_model: String,
    pub new_model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Message range summarized by a compaction, inclusive indices into the
/// projection at the time of compaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactRange {
    pub from: u32,
    pub to: u32,
}

/// `compact.boundary` — durable marker; the event log itself is never rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactBoundaryPayload {
    pub range: CompactRange,
    pub original_tokens: u64,
    pub compacted_tokens: u64,
    pub summary: String,
}

/// `stream.turn_start`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamTurnStartPayload {
    pub turn: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// `stream.turn_end`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamTurnEndPayload {
    pub turn: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
}

/// How a subagent session was spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnType {
    Subsession,
    Tmux,
}

/// How a subagent run concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionType {
    Completed,
    Error,
    Timeout,
}

/// `subagent.spawned`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubagentSpawnedPayload {
    pub subagent_session_id: SessionId,
    pub spawn_type: SpawnType,
    pub task: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// `subagent.completed`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubagentCompletedPayload {
    pub subagent_session_id: SessionId,
    pub completion_type: CompletionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

/// `subagent.failed`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubagentFailedPayload {
    pub subagent_session_id: SessionId,
    pub completion_type: CompletionType,
    pub error: String,
}

/// `notification.subagent_result`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSubagentResultPayload {
    pub subagent_session_id: SessionId,
    pub task: String,
    pub result: String,
}

/// `hook.triggered`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookTriggeredPayload {
    pub hook_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn: Option<u32>,
}

/// `hook.completed`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookCompletedPayload {
    pub hook_name: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// `error.agent`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorAgentPayload {
    /// Stable category token, e.g. `TOKEN_EXTRACTION` or `PROVIDER`.
    pub category: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn: Option<u32>,
}

/// `agent.interrupted` — cancellation with whatever content had streamed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInterruptedPayload {
    pub partial_content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn: Option<u32>,
}

/// `memory.ledger`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryLedgerPayload {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// `rules.loaded`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RulesLoadedPayload {
    pub paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<u64>,
}

/// Typed view over an event payload, selected by the event's `type` column.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    SessionStart(SessionStartPayload),
    SessionEnd(SessionEndPayload),
    SessionFork(SessionForkPayload),
    MessageUser(UserMessagePayload),
    MessageAssistant(AssistantMessagePayload),
    MessageDeleted(MessageDeletedPayload),
    ToolCall(ToolCallEventPayload),
    ToolResult(ToolResultPayload),
    ConfigModelSwitch(ConfigModelSwitchPayload),
    CompactBoundary(CompactBoundaryPayload),
    StreamTurnStart(StreamTurnStartPayload),
    StreamTurnEnd(StreamTurnEndPayload),
    SubagentSpawned(SubagentSpawnedPayload),
    SubagentCompleted(SubagentCompletedPayload),
    SubagentFailed(SubagentFailedPayload),
    NotificationSubagentResult(NotificationSubagentResultPayload),
    HookTriggered(HookTriggeredPayload),
    HookCompleted(HookCompletedPayload),
    ErrorAgent(ErrorAgentPayload),
    AgentInterrupted(AgentInterruptedPayload),
    MemoryLedger(MemoryLedgerPayload),
    RulesLoaded(RulesLoadedPayload),
}

impl EventPayload {
    /// Parse a raw payload against the schema for `event_type`.
    pub fn parse(event_type: EventType, payload: &Value) -> crate::error::Result<Self> {
        fn of<T: serde::de::DeserializeOwned>(
            event_type: EventType,
            payload: &Value,
        ) -> crate::error::Result<T> {
            serde_json::from_value(payload.clone()).map_err(|source| {
                crate::error::Error::PayloadMismatch {
                    event_type: event_type.as_str().to_string(),
                    source,
                }
            })
        }

        Ok(match event_type {
            EventType::SessionStart => EventPayload::SessionStart(of(event_type, payload)?),
            EventType::SessionEnd => EventPayload::SessionEnd(of(event_type, payload)?),
            EventType::SessionFork => EventPayload::SessionFork(of(event_type, payload)?),
            EventType::MessageUser => EventPayload::MessageUser(of(event_type, payload)?),
            EventType::MessageAssistant => {
                EventPayload::MessageAssistant(of(event_type, payload)?)
            }
            EventType::MessageDeleted => EventPayload::MessageDeleted(of(event_type, payload)?),
            EventType::ToolCall => EventPayload::ToolCall(of(event_type, payload)?),
            EventType::ToolResult => EventPayload::ToolResult(of(event_type, payload)?),
            EventType::ConfigModelSwitch => {
                EventPayload::ConfigModelSwitch(of(event_type, payload)?)
            }
            EventType::CompactBoundary => EventPayload::CompactBoundary(of(event_type, payload)?),
            EventType::StreamTurnStart => EventPayload::StreamTurnStart(of(event_type, payload)?),
            EventType::StreamTurnEnd => EventPayload::StreamTurnEnd(of(event_type, payload)?),
            EventType::SubagentSpawned => EventPayload::SubagentSpawned(of(event_type, payload)?),
            EventType::SubagentCompleted => {
                EventPayload::SubagentCompleted(of(event_type, payload)?)
            }
            EventType::SubagentFailed => EventPayload::SubagentFailed(of(event_type, payload)?),
            EventType::NotificationSubagentResult => {
                EventPayload::NotificationSubagentResult(of(event_type, payload)?)
            }
            EventType::HookTriggered => EventPayload::HookTriggered(of(event_type, payload)?),
            EventType::HookCompleted => EventPayload::HookCompleted(of(event_type, payload)?),
            EventType::ErrorAgent => EventPayload::ErrorAgent(of(event_type, payload)?),
            EventType::AgentInterrupted => {
                EventPayload::AgentInterrupted(of(event_type, payload)?)
            }
            EventType::MemoryLedger => EventPayload::MemoryLedger(of(event_type, payload)?),
            EventType::RulesLoaded => EventPayload::RulesLoaded(of(event_type, payload)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn session_start_payload_uses_camel_case() {
        let payload = SessionStartPayload {
            working_directory: "/work".to_string(),
            model: "claude-sonnet-4-5-20250929".to_string(),
            provider: Some("anthropic".to_string()),
            title: None,
            system_prompt: None,
            tags: None,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["workingDirectory"], "/work");
        assert!(json.get("systemPrompt").is_none());
    }

    #[test]
    fn user_content_accepts_plain_string() {
        let payload: UserMessagePayload =
            serde_json::from_value(json!({"content": "hello", "turn": 1})).unwrap();
        assert_eq!(payload.content.text(), "hello");
    }

    #[test]
    fn user_content_accepts_blocks() {
        let payload: UserMessagePayload = serde_json::from_value(json!({
            "content": [{"type": "text", "text": "look at this"}],
            "turn": 2
        }))
        .unwrap();
        assert_eq!(payload.content.to_blocks().len(), 1);
    }

    #[test]
    fn tool_result_omits_default_truncated_flag() {
        let payload = ToolResultPayload {
            tool_call_id: ToolCallId::from_raw("toolu_01"),
            content: "ok".to_string(),
            is_error: false,
            duration: None,
            truncated: false,
            blob_id: None,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("truncated").is_none());

        let round: ToolResultPayload = serde_json::from_value(json).unwrap();
        assert!(!round.truncated);
    }

    #[test]
    fn parse_dispatches_on_event_type() {
        let value = json!({"previousModel": "a", "newModel": "b"});
        match EventPayload::parse(EventType::ConfigModelSwitch, &value).unwrap() {
            EventPayload::ConfigModelSwitch(p) => {
                assert_eq!(p.previous_model, "a");
                assert_eq!(p.new_model, "b");
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn parse_rejects_mismatched_payload() {
        let value = json!({"nonsense": true});
        let err = EventPayload::parse(EventType::SessionStart, &value).unwrap_err();
        assert!(err.to_string().contains("session.start"));
    }
}
