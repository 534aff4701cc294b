mod event;
mod kind;
mod payload;

pub use event::{payload_index_fields, IndexFields, SessionEvent};
pub use kind::{EventType, ALL_EVENT_TYPES};
pub use payload::{
    AgentInterruptedPayload, AssistantMessagePayload, CompactBoundaryPayload, CompactRange,
    CompletionType, ConfigModelSwitchPayload, ErrorAgentPayload, EventPayload,
    HookCompletedPayload, HookTriggeredPayload, MemoryLedgerPayload, MessageDeletedPayload,
    NotificationSubagentResultPayload, RulesLoadedPayload, SessionEndPayload, SessionEndReason,
    SessionForkPayload, SessionStartPayload, SpawnType, StreamTurnEndPayload,
    StreamTurnStartPayload, SubagentCompletedPayload, SubagentFailedPayload,
    SubagentSpawnedPayload, ToolCallEventPayload, ToolResultPayload, UserContent,
    UserMessagePayload,
};
