// Runtime layer - per-session serialization and orchestration
// Owns the linearizer queues, the orchestrator façade, the offload policy
// and the subagent registry; everything durable lives in chronicle-store

mod config;
mod error;
mod linearizer;
mod offload;
mod orchestrator;
mod session;
mod subagent;
mod usage;

pub use config::{resolve_data_root, Config};
pub use error::{Error, Result};
pub use linearizer::{OnCreated, SessionLinearizer};
pub use offload::{offload_tool_result, OffloadedResult, EMBED_DIRECT_SIZE, MAX_TOOL_RESULT_SIZE};
pub use orchestrator::{AgentSignal, Orchestrator, UiEvent};
pub use session::{OpenOptions, SessionRuntime};
pub use subagent::{SubagentManager, SubagentOutcome};
pub use usage::{TokenUsageTracker, TurnUsage};
