pub mod compaction;
pub mod estimate;
pub mod manager;

pub use compaction::{
    CompactionOutcome, CompactionPreview, Summarizer, Summary, COMPACTION_ACK,
    COMPACTION_SUMMARY_PREFIX,
};
pub use manager::{
    ContextConfig, ContextManager, ContextSnapshot, ProcessedToolResult, ThresholdLevel,
    TokenBreakdown, ToolDefinition, TurnCheck,
};
