use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::{EventId, RunId, SessionId, WorkspaceId};

use super::kind::EventType;
use super::payload::EventPayload;

// NOTE: Chain Design
//
// Events form a per-session linked list: `parent_id` points at the previous
// event on the chain and `sequence` is dense and strictly monotonic (0, 1,
// 2, ...). The chain is linear, never a tree — forking materializes a new
// session rather than branching this one. Replayability depends on exactly
// this structure: walking ancestors from any event deterministically
// recovers the session state at that point.

/// A durable session event. Maps 1:1 to a row in the `events` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEvent {
    /// Unique event ID.
    pub id: EventId,

    /// Session this event belongs to.
    pub session_id: SessionId,

    /// Workspace the session belongs to.
    pub workspace_id: WorkspaceId,

    /// Previous event on this session's chain. `None` only for the root.
    pub parent_id: Option<EventId>,

    /// Dense, strictly monotonic position on the chain, starting at 0.
    pub sequence: i64,

    /// Creation time (UTC).
    pub timestamp: DateTime<Utc>,

    /// Event type; selects the payload schema.
    #[serde(rename = "type")]
    pub event_type: EventType,

    /// Raw payload JSON, shaped per `event_type`.
    pub payload: Value,

    /// Agent-run correlation ID, when the event was produced inside a run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
}

impl SessionEvent {
    /// Parse the payload against the schema for this event's type.
    pub fn typed_payload(&self) -> crate::error::Result<EventPayload> {
        EventPayload::parse(self.event_type, &self.payload)
    }
}

/// Indexed columns mirrored from the payload for query acceleration.
///
/// Kept in lockstep with the payload schemas: extraction is lossy by design
/// (only the fields worth an index), and absent fields stay NULL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexFields {
    pub turn: Option<u32>,
    pub tool_name: Option<String>,
    pub tool_call_id: Option<String>,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

/// Extract the mirrored index columns for an event about to be persisted.
pub fn payload_index_fields(event_type: EventType, payload: &Value) -> IndexFields {
    let turn_of = |v: &Value| v.get("turn").and_then(Value::as_u64).map(|t| t as u32);

    match event_type {
        EventType::MessageUser
        | EventType::StreamTurnStart
        | EventType::StreamTurnEnd
        | EventType::AgentInterrupted => IndexFields {
            turn: turn_of(payload),
            ..IndexFields::default()
        },
        EventType::MessageAssistant => IndexFields {
            turn: turn_of(payload),
            input_tokens: payload
                .pointer("/tokenUsage/inputTokens")
                .and_then(Value::as_u64),
            output_tokens: payload
                .pointer("/tokenUsage/outputTokens")
                .and_then(Value::as_u64),
            ..IndexFields::default()
        },
        EventType::ToolCall => IndexFields {
            turn: turn_of(payload),
            tool_name: payload
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string),
            tool_call_id: payload
                .get("toolCallId")
                .and_then(Value::as_str)
                .map(str::to_string),
            ..IndexFields::default()
        },
        EventType::ToolResult => IndexFields {
            tool_call_id: payload
                .get("toolCallId")
                .and_then(Value::as_str)
                .map(str::to_string),
            ..IndexFields::default()
        },
        _ => IndexFields::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_serializes_with_type_key() {
        let event = SessionEvent {
            id: EventId::from_raw("evt_1"),
            session_id: SessionId::from_raw("ses_1"),
            workspace_id: WorkspaceId::from_raw("ws_1"),
            parent_id: None,
            sequence: 0,
            timestamp: Utc::now(),
            event_type: EventType::SessionStart,
            payload: json!({"workingDirectory": "/w", "model": "m"}),
            run_id: None,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "session.start");
        assert_eq!(json["sessionId"], "ses_1");
        assert!(json.get("runId").is_none());

        let back: SessionEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back.event_type, EventType::SessionStart);
    }

    #[test]
    fn index_fields_for_assistant_message() {
        let payload = json!({
            "content": [], "turn": 3, "model": "m", "stopReason": "end_turn",
            "tokenUsage": {"inputTokens": 120, "outputTokens": 45}
        });
        let fields = payload_index_fields(EventType::MessageAssistant, &payload);
        assert_eq!(fields.turn, Some(3));
        assert_eq!(fields.input_tokens, Some(120));
        assert_eq!(fields.output_tokens, Some(45));
        assert_eq!(fields.tool_name, None);
    }

    #[test]
    fn index_fields_for_tool_events() {
        let call = json!({"toolCallId": "toolu_01", "name": "Read", "arguments": {}, "turn": 1});
        let fields = payload_index_fields(EventType::ToolCall, &call);
        assert_eq!(fields.tool_name.as_deref(), Some("Read"));
        assert_eq!(fields.tool_call_id.as_deref(), Some("toolu_01"));

        let result = json!({"toolCallId": "toolu_01", "content": "ok", "isError": false});
        let fields = payload_index_fields(EventType::ToolResult, &result);
        assert_eq!(fields.tool_call_id.as_deref(), Some("toolu_01"));
        assert_eq!(fields.turn, None);
    }

    #[test]
    fn index_fields_default_for_markers() {
        let fields = payload_index_fields(EventType::CompactBoundary, &json!({}));
        assert_eq!(fields, IndexFields::default());
    }
}
