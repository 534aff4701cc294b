// Engine layer - deterministic reconstruction and context management
// Sits between the durable store (chronicle-store) and the runtime

mod error;
mod reconstruct;
mod turn;

pub mod context;

pub use context::{
    CompactionOutcome, CompactionPreview, ContextConfig, ContextManager, ContextSnapshot,
    ProcessedToolResult, Summarizer, Summary, ThresholdLevel, TokenBreakdown, ToolDefinition,
    TurnCheck, COMPACTION_ACK, COMPACTION_SUMMARY_PREFIX,
};
pub use error::{Error, Result};
pub use reconstruct::{reconstruct, Reconstruction};
pub use turn::TurnContentTracker;
