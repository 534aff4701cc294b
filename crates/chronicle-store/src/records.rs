use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chronicle_types::{BlobId, EventId, SessionId, SpawnType, WorkspaceId};

/// A workspace row: one per canonical project path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceRecord {
    pub id: WorkspaceId,
    pub path: String,
    pub created_at: DateTime<Utc>,
}

/// A session row, including the derived caches maintained by `append`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub workspace_id: WorkspaceId,
    pub working_directory: String,
    /// Latest model in effect (updated by `config.model_switch`).
    pub model: String,
    pub title: Option<String>,
    pub system_prompt: Option<String>,
    pub tags: Vec<String>,
    /// Tip of the linear chain; `None` only before the root event lands.
    pub head_event_id: Option<EventId>,
    pub turn_count: u32,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_cache_read_tokens: u64,
    pub total_cache_creation_tokens: u64,
    pub total_cost: f64,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub parent_session_id: Option<SessionId>,
    pub spawn_type: Option<SpawnType>,
    pub spawn_task: Option<String>,
}

/// Options for creating a session.
#[derive(Debug, Clone, Default)]
pub struct CreateSession {
    pub workspace_path: String,
    pub working_directory: String,
    pub model: String,
    pub title: Option<String>,
    pub tags: Vec<String>,
    pub system_prompt: Option<String>,
    pub parent_session_id: Option<SessionId>,
    pub spawn_type: Option<SpawnType>,
    pub spawn_task: Option<String>,
    pub provider: Option<String>,
}

/// A content-addressed blob row.
#[derive(Debug, Clone, PartialEq)]
pub struct BlobRecord {
    pub id: BlobId,
    pub hash: String,
    pub content: Vec<u8>,
    pub mime_type: Option<String>,
    pub size_original: u64,
    pub created_at: DateTime<Utc>,
}

/// Structured application log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level_num: u8,
    pub level: String,
    pub component: String,
    pub session_id: Option<SessionId>,
    pub message: String,
    pub error_message: Option<String>,
    pub data: Option<serde_json::Value>,
}

impl LogRecord {
    pub fn new(
        level_num: u8,
        level: impl Into<String>,
        component: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            level_num,
            level: level.into(),
            component: component.into(),
            session_id: None,
            message: message.into(),
            error_message: None,
            data: None,
        }
    }

    pub fn for_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }
}

pub(crate) fn parse_ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| DateTime::<Utc>::MIN_UTC)
}

pub(crate) fn spawn_type_to_str(spawn_type: SpawnType) -> &'static str {
    match spawn_type {
        SpawnType::Subsession => "subsession",
        SpawnType::Tmux => "tmux",
    }
}

pub(crate) fn spawn_type_from_str(raw: &str) -> Option<SpawnType> {
    match raw {
        "subsession" => Some(SpawnType::Subsession),
        "tmux" => Some(SpawnType::Tmux),
        _ => None,
    }
}
