use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Type of a durable session event.
///
/// This is a closed set: the store rejects anything it cannot parse, and the
/// reconstructor and orchestrator dispatch with exhaustive matches so a new
/// variant fails closed at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "session.start")]
    SessionStart,
    #[serde(rename = "session.end")]
    SessionEnd,
    #[serde(rename = "session.fork")]
    SessionFork,
    #[serde(rename = "message.user")]
    MessageUser,
    #[serde(rename = "message.assistant")]
    MessageAssistant,
    #[serde(rename = "message.deleted")]
    MessageDeleted,
    #[serde(rename = "tool.call")]
    ToolCall,
    #[serde(rename = "tool.result")]
    ToolResult,
    #[serde(rename = "config.model_switch")]
    ConfigModelSwitch,
    #[serde(rename = "compact.boundary")]
    CompactBoundary,
    #[serde(rename = "stream.turn_start")]
    StreamTurnStart,
    #[serde(rename = "stream.turn_end")]
    StreamTurnEnd,
    #[serde(rename = "subagent.spawned")]
    SubagentSpawned,
    #[serde(rename = "subagent.completed")]
    SubagentCompleted,
    #[serde(rename = "subagent.failed")]
    SubagentFailed,
    #[serde(rename = "notification.subagent_result")]
    NotificationSubagentResult,
    #[serde(rename = "hook.triggered")]
    HookTriggered,
    #[serde(rename = "hook.completed")]
    HookCompleted,
    #[serde(rename = "error.agent")]
    ErrorAgent,
    #[serde(rename = "agent.interrupted")]
    AgentInterrupted,
    #[serde(rename = "memory.ledger")]
    MemoryLedger,
    #[serde(rename = "rules.loaded")]
    RulesLoaded,
}

/// Every event type, in declaration order.
pub const ALL_EVENT_TYPES: [EventType; 22] = [
    EventType::SessionStart,
    EventType::SessionEnd,
    EventType::SessionFork,
    EventType::MessageUser,
    EventType::MessageAssistant,
    EventType::MessageDeleted,
    EventType::ToolCall,
    EventType::ToolResult,
    EventType::ConfigModelSwitch,
    EventType::CompactBoundary,
    EventType::StreamTurnStart,
    EventType::StreamTurnEnd,
    EventType::SubagentSpawned,
    EventType::SubagentCompleted,
    EventType::SubagentFailed,
    EventType::NotificationSubagentResult,
    EventType::HookTriggered,
    EventType::HookCompleted,
    EventType::ErrorAgent,
    EventType::AgentInterrupted,
    EventType::MemoryLedger,
    EventType::RulesLoaded,
];

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::SessionStart => "session.start",
            EventType::SessionEnd => "session.end",
            EventType::SessionFork => "session.fork",
            EventType::MessageUser => "message.user",
            EventType::MessageAssistant => "message.assistant",
            EventType::MessageDeleted => "message.deleted",
            EventType::ToolCall => "tool.call",
            EventType::ToolResult => "tool.result",
            EventType::ConfigModelSwitch => "config.model_switch",
            EventType::CompactBoundary => "compact.boundary",
            EventType::StreamTurnStart => "stream.turn_start",
            EventType::StreamTurnEnd => "stream.turn_end",
            EventType::SubagentSpawned => "subagent.spawned",
            EventType::SubagentCompleted => "subagent.completed",
            EventType::SubagentFailed => "subagent.failed",
            EventType::NotificationSubagentResult => "notification.subagent_result",
            EventType::HookTriggered => "hook.triggered",
            EventType::HookCompleted => "hook.completed",
            EventType::ErrorAgent => "error.agent",
            EventType::AgentInterrupted => "agent.interrupted",
            EventType::MemoryLedger => "memory.ledger",
            EventType::RulesLoaded => "rules.loaded",
        }
    }

    /// Domain prefix before the first dot (e.g. "message" for `message.user`).
    pub fn domain(&self) -> &'static str {
        match self.as_str().split_once('.') {
            Some((domain, _)) => domain,
            None => self.as_str(),
        }
    }

    /// Whether this event type contributes a message to the projection.
    pub fn is_message_bearing(&self) -> bool {
        matches!(
            self,
            EventType::MessageUser | EventType::MessageAssistant | EventType::ToolResult
        )
    }

    /// Whether a `message.deleted` tombstone may target this event type.
    pub fn is_deletable(&self) -> bool {
        self.is_message_bearing()
    }

    /// Whether this is a session lifecycle event (`session.*`).
    pub fn is_session_type(&self) -> bool {
        matches!(
            self,
            EventType::SessionStart | EventType::SessionEnd | EventType::SessionFork
        )
    }

    /// Whether this is a subagent lifecycle event (`subagent.*`).
    pub fn is_subagent_type(&self) -> bool {
        matches!(
            self,
            EventType::SubagentSpawned | EventType::SubagentCompleted | EventType::SubagentFailed
        )
    }

    /// Whether this is a streaming marker event (`stream.*`).
    ///
    /// Durable, but downstream consumers must tolerate their absence.
    pub fn is_stream_type(&self) -> bool {
        matches!(self, EventType::StreamTurnStart | EventType::StreamTurnEnd)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_EVENT_TYPES
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| Error::UnknownEventType(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_event_types_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for t in &ALL_EVENT_TYPES {
            assert!(seen.insert(t.as_str()), "duplicate event type: {t}");
        }
    }

    #[test]
    fn as_str_matches_serde() {
        for t in &ALL_EVENT_TYPES {
            let json = serde_json::to_value(t).unwrap();
            assert_eq!(json.as_str().unwrap(), t.as_str());
        }
    }

    #[test]
    fn from_str_roundtrip() {
        for t in &ALL_EVENT_TYPES {
            let parsed: EventType = t.as_str().parse().unwrap();
            assert_eq!(*t, parsed);
        }
    }

    #[test]
    fn from_str_rejects_invalid() {
        assert!("not.a.type".parse::<EventType>().is_err());
        assert!("".parse::<EventType>().is_err());
    }

    #[test]
    fn domain_extraction() {
        assert_eq!(EventType::SessionStart.domain(), "session");
        assert_eq!(EventType::MessageUser.domain(), "message");
        assert_eq!(EventType::ToolCall.domain(), "tool");
        assert_eq!(EventType::ConfigModelSwitch.domain(), "config");
        assert_eq!(EventType::AgentInterrupted.domain(), "agent");
    }

    #[test]
    fn deletable_targets() {
        assert!(EventType::MessageUser.is_deletable());
        assert!(EventType::MessageAssistant.is_deletable());
        assert!(EventType::ToolResult.is_deletable());
        assert!(!EventType::SessionStart.is_deletable());
        assert!(!EventType::CompactBoundary.is_deletable());
        assert!(!EventType::ToolCall.is_deletable());
    }
}
