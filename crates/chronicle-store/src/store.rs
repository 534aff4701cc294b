use std::path::Path;

use chrono::Utc;
use serde_json::Value;

use chronicle_types::{
    BlobId, EventId, EventType, SessionEvent, SessionId, WorkspaceId,
};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::queries::{blob, event, log, search, session, workspace};
use crate::records::{BlobRecord, CreateSession, LogRecord, SessionRecord, WorkspaceRecord};

pub use crate::queries::event::{AppendEvent, EventQuery};
pub use crate::queries::log::LogQuery;
pub use crate::queries::search::{FtsHit, FtsQuery, VectorHit};

/// Process-wide handle to the durable store: events, sessions, workspaces,
/// blobs, logs and search indices, all in one SQLite file.
///
/// Cheap to clone; all clones share the same connection. Wrap it in a
/// context passed to each session rather than a global, so tests can run
/// against isolated stores.
#[derive(Clone)]
pub struct EventStore {
    db: Database,
}

impl EventStore {
    /// Open or create the store at `path`, migrating to the current schema.
    pub fn open_or_create(path: &Path) -> Result<Self> {
        Ok(Self {
            db: Database::open(path)?,
        })
    }

    /// Isolated in-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            db: Database::open_in_memory()?,
        })
    }

    // ── Sessions ────────────────────────────────────────────────────────

    /// Atomically: ensure the workspace row, mint the session, and append
    /// its `session.start` root event (sequence 0, no parent).
    pub fn create_session(&self, opts: &CreateSession) -> Result<(SessionRecord, SessionEvent)> {
        self.db.with_tx(|tx| {
            let ws = workspace::get_or_create(tx, &opts.workspace_path)?;
            let now = Utc::now();

            let record = SessionRecord {
                id: SessionId::mint(),
                workspace_id: ws.id.clone(),
                working_directory: opts.working_directory.clone(),
                model: opts.model.clone(),
                title: opts.title.clone(),
                system_prompt: opts.system_prompt.clone(),
                tags: opts.tags.clone(),
                head_event_id: None,
                turn_count: 0,
                total_input_tokens: 0,
                total_output_tokens: 0,
                total_cache_read_tokens: 0,
                total_cache_creation_tokens: 0,
                total_cost: 0.0,
                created_at: now,
                last_activity_at: now,
                ended_at: None,
                parent_session_id: opts.parent_session_id.clone(),
                spawn_type: opts.spawn_type,
                spawn_task: opts.spawn_task.clone(),
            };
            session::insert(tx, &record)?;

            let mut payload = serde_json::json!({
                "workingDirectory": opts.working_directory,
                "model": opts.model,
            });
            if let Some(provider) = &opts.provider {
                payload["provider"] = Value::String(provider.clone());
            }
            if let Some(title) = &opts.title {
                payload["title"] = Value::String(title.clone());
            }
            if let Some(system_prompt) = &opts.system_prompt {
                payload["systemPrompt"] = Value::String(system_prompt.clone());
            }
            if !opts.tags.is_empty() {
                payload["tags"] = serde_json::to_value(&opts.tags)?;
            }

            let root = event::append(
                tx,
                &AppendEvent::new(record.id.clone(), EventType::SessionStart, payload),
            )?;

            let refreshed = session::get_by_id(tx, &record.id)?
                .ok_or_else(|| Error::NotFound(format!("session {}", record.id)))?;
            Ok((refreshed, root))
        })
    }

    /// Resolve a session by full ID or unambiguous prefix.
    pub fn get_session(&self, id_or_prefix: &str) -> Result<Option<SessionRecord>> {
        self.db
            .with_conn(|conn| session::get_by_id_or_prefix(conn, id_or_prefix))
    }

    pub fn list_sessions(
        &self,
        workspace_id: Option<&WorkspaceId>,
        limit: usize,
    ) -> Result<Vec<SessionRecord>> {
        self.db
            .with_conn(|conn| session::list(conn, workspace_id, limit))
    }

    pub fn get_workspace(&self, id: &WorkspaceId) -> Result<Option<WorkspaceRecord>> {
        self.db.with_conn(|conn| workspace::get_by_id(conn, id))
    }

    /// Update the session's cached latest model without producing an event.
    pub fn update_latest_model(&self, session_id: &SessionId, model: &str) -> Result<()> {
        self.db.with_conn(|conn| {
            if session::update_model(conn, session_id, model)? {
                Ok(())
            } else {
                Err(Error::NotFound(format!("session {session_id}")))
            }
        })
    }

    /// Fold a turn's computed cost into the session total.
    pub fn add_session_cost(&self, session_id: &SessionId, cost: f64) -> Result<()> {
        self.db.with_conn(|conn| {
            if session::add_cost(conn, session_id, cost)? {
                Ok(())
            } else {
                Err(Error::NotFound(format!("session {session_id}")))
            }
        })
    }

    /// Fork: materialize a NEW session whose chain is a copy of the source
    /// chain up to `source_event_id`, with freshly minted event IDs,
    /// followed by a `session.fork` marker. The source session is not
    /// branched or modified.
    pub fn fork_session(
        &self,
        source_session_id: &SessionId,
        source_event_id: &EventId,
        name: Option<&str>,
        reason: Option<&str>,
    ) -> Result<(SessionRecord, SessionEvent)> {
        self.db.with_tx(|tx| {
            let source = session::get_by_id(tx, source_session_id)?
                .ok_or_else(|| Error::NotFound(format!("session {source_session_id}")))?;

            let source_event = event::get(tx, source_event_id)?
                .ok_or_else(|| Error::NotFound(format!("event {source_event_id}")))?;
            if source_event.session_id != *source_session_id {
                return Err(Error::InvalidOperation(format!(
                    "event {source_event_id} does not belong to session {source_session_id}"
                )));
            }

            let chain = event::ancestors(tx, source_event_id)?;
            let now = Utc::now();

            let record = SessionRecord {
                id: SessionId::mint(),
                workspace_id: source.workspace_id.clone(),
                working_directory: source.working_directory.clone(),
                model: source.model.clone(),
                title: name.map(str::to_string).or_else(|| source.title.clone()),
                system_prompt: source.system_prompt.clone(),
                tags: source.tags.clone(),
                head_event_id: None,
                turn_count: 0,
                total_input_tokens: 0,
                total_output_tokens: 0,
                total_cache_read_tokens: 0,
                total_cache_creation_tokens: 0,
                total_cost: 0.0,
                created_at: now,
                last_activity_at: now,
                ended_at: None,
                parent_session_id: None,
                spawn_type: None,
                spawn_task: None,
            };
            session::insert(tx, &record)?;

            // Copy the chain: fresh IDs, preserved order, payloads and
            // timestamps. Aggregates are rebuilt by folding each copy.
            let mut parent: Option<EventId> = None;
            for source_evt in &chain {
                let copy = SessionEvent {
                    id: EventId::mint(),
                    session_id: record.id.clone(),
                    workspace_id: record.workspace_id.clone(),
                    parent_id: parent.clone(),
                    sequence: source_evt.sequence,
                    timestamp: source_evt.timestamp,
                    event_type: source_evt.event_type,
                    payload: source_evt.payload.clone(),
                    run_id: source_evt.run_id.clone(),
                };
                event::insert_event(tx, &copy)?;
                event::apply_aggregates(tx, &copy)?;
                parent = Some(copy.id);
            }

            let mut payload = serde_json::json!({
                "sourceSessionId": source_session_id.as_str(),
                "sourceEventId": source_event_id.as_str(),
            });
            if let Some(name) = name {
                payload["name"] = Value::String(name.to_string());
            }
            if let Some(reason) = reason {
                payload["reason"] = Value::String(reason.to_string());
            }

            let fork_event = event::append(
                tx,
                &AppendEvent::new(record.id.clone(), EventType::SessionFork, payload),
            )?;

            let refreshed = session::get_by_id(tx, &record.id)?
                .ok_or_else(|| Error::NotFound(format!("session {}", record.id)))?;
            Ok((refreshed, fork_event))
        })
    }

    // ── Events ──────────────────────────────────────────────────────────

    /// Append an event to a session chain. Sequence, parent and timestamp
    /// are assigned here; aggregates and indices update atomically.
    pub fn append(&self, req: &AppendEvent) -> Result<SessionEvent> {
        self.db.with_tx(|tx| event::append(tx, req))
    }

    pub fn get_event(&self, event_id: &EventId) -> Result<Option<SessionEvent>> {
        self.db.with_conn(|conn| event::get(conn, event_id))
    }

    pub fn get_events_by_session(
        &self,
        session_id: &SessionId,
        query: &EventQuery,
    ) -> Result<Vec<SessionEvent>> {
        self.db
            .with_conn(|conn| event::list_by_session(conn, session_id, query))
    }

    pub fn get_recent_events(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<SessionEvent>> {
        self.db
            .with_conn(|conn| event::list_recent(conn, session_id, limit))
    }

    pub fn get_events_since(
        &self,
        session_id: &SessionId,
        after_sequence: i64,
        limit: usize,
    ) -> Result<Vec<SessionEvent>> {
        self.db
            .with_conn(|conn| event::list_since(conn, session_id, after_sequence, limit))
    }

    pub fn count_events(&self, session_id: &SessionId) -> Result<u64> {
        self.db.with_conn(|conn| event::count(conn, session_id))
    }

    /// The linear chain from the session root to `event_id` inclusive.
    pub fn get_ancestors(&self, event_id: &EventId) -> Result<Vec<SessionEvent>> {
        self.db.with_conn(|conn| event::ancestors(conn, event_id))
    }

    /// Append a `message.deleted` tombstone for `target_event_id`. The
    /// target stays in the log; reconstruction hides it.
    pub fn delete_message(
        &self,
        session_id: &SessionId,
        target_event_id: &EventId,
        reason: Option<&str>,
    ) -> Result<SessionEvent> {
        self.db.with_tx(|tx| {
            let target = event::get(tx, target_event_id)?
                .ok_or_else(|| Error::NotFound(format!("event {target_event_id}")))?;

            if target.session_id != *session_id {
                return Err(Error::NotFound(format!(
                    "event {target_event_id} in session {session_id}"
                )));
            }
            if !target.event_type.is_deletable() {
                return Err(Error::InvalidOperation(format!(
                    "Cannot delete {} events",
                    target.event_type
                )));
            }
            if event::has_tombstone(tx, session_id, target_event_id)? {
                return Err(Error::InvalidOperation(format!(
                    "Cannot delete {target_event_id}: already deleted"
                )));
            }

            let payload = serde_json::json!({
                "targetEventId": target_event_id.as_str(),
                "targetType": target.event_type.as_str(),
                "targetTurn": target.payload.get("turn").and_then(Value::as_u64),
                "reason": reason.unwrap_or("user_request"),
            });

            event::append(
                tx,
                &AppendEvent::new(session_id.clone(), EventType::MessageDeleted, payload),
            )
        })
    }

    // ── Blobs ───────────────────────────────────────────────────────────

    pub fn blob_store(&self, bytes: &[u8], mime_type: Option<&str>) -> Result<BlobId> {
        self.db.with_conn(|conn| blob::store(conn, bytes, mime_type))
    }

    pub fn blob_get(&self, blob_id: &BlobId) -> Result<Option<BlobRecord>> {
        self.db.with_conn(|conn| blob::get(conn, blob_id))
    }

    // ── Logs ────────────────────────────────────────────────────────────

    pub fn log_append(&self, record: &LogRecord) -> Result<()> {
        self.db.with_conn(|conn| log::append(conn, record))
    }

    pub fn logs_for_session(
        &self,
        session_id: &SessionId,
        query: &LogQuery,
    ) -> Result<Vec<LogRecord>> {
        self.db
            .with_conn(|conn| log::get_for_session(conn, session_id, query))
    }

    // ── Search indices ──────────────────────────────────────────────────

    pub fn fts_search(&self, query: &str, opts: &FtsQuery) -> Result<Vec<FtsHit>> {
        self.db
            .with_conn(|conn| search::fts_search(conn, query, opts))
    }

    pub fn vector_put(&self, event_id: &EventId, embedding: &[f32]) -> Result<()> {
        self.db
            .with_conn(|conn| search::vector_put(conn, event_id, embedding))
    }

    pub fn vector_search(&self, query: &[f32], limit: usize) -> Result<Vec<VectorHit>> {
        self.db
            .with_conn(|conn| search::vector_search(conn, query, limit))
    }
}
