mod error;
mod id;
mod message;
mod usage;
mod util;

pub mod event;

pub use error::{Error, Result};
pub use event::{
    payload_index_fields, AgentInterruptedPayload, AssistantMessagePayload, CompactBoundaryPayload,
    CompactRange, CompletionType, ConfigModelSwitchPayload, ErrorAgentPayload, EventPayload,
    EventType, HookCompletedPayload, HookTriggeredPayload, IndexFields, MemoryLedgerPayload,
    MessageDeletedPayload, NotificationSubagentResultPayload, RulesLoadedPayload,
    SessionEndPayload, SessionEndReason, SessionEvent, SessionForkPayload, SessionStartPayload,
    SpawnType, StreamTurnEndPayload, StreamTurnStartPayload, SubagentCompletedPayload,
    SubagentFailedPayload, SubagentSpawnedPayload, ToolCallEventPayload, ToolResultPayload,
    UserContent, UserMessagePayload, ALL_EVENT_TYPES,
};
pub use id::{BlobId, EventId, RunId, SessionId, ToolCallId, WorkspaceId};
pub use message::{ContentBlock, ImageSource, Message, MessageRole, StopReason};
pub use usage::{NormalizedUsage, TokenUsage};
pub use util::{format_truncation_notice, is_truncated, TRUNCATION_MARKER};
