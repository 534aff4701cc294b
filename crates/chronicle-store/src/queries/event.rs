use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use serde_json::Value;

use chronicle_types::{
    payload_index_fields, EventId, EventType, RunId, SessionEvent, SessionId, WorkspaceId,
};

use crate::error::{Error, Result};
use crate::queries::search;

// NOTE: Append Atomicity
//
// An append is one transaction: event insert, session aggregate update and
// FTS index row all commit together. The session's `head_event_id` is read
// and rewritten inside that same transaction, which is what makes the
// parent chain correct — a reader can never observe a head that points at
// an event which has not been inserted yet.

/// Request to append one event to a session chain.
#[derive(Debug, Clone)]
pub struct AppendEvent {
    pub session_id: SessionId,
    pub event_type: EventType,
    pub payload: Value,
    /// When present, the append is rejected unless this still names the
    /// current head (optimistic check for callers that read the head
    /// outside the linearizer).
    pub expected_parent_id: Option<EventId>,
    pub run_id: Option<RunId>,
}

impl AppendEvent {
    pub fn new(session_id: SessionId, event_type: EventType, payload: Value) -> Self {
        Self {
            session_id,
            event_type,
            payload,
            expected_parent_id: None,
            run_id: None,
        }
    }
}

/// Filters for `list_by_session`.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub types: Option<Vec<EventType>>,
    pub turn: Option<u32>,
    pub tool_call_id: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub after_event_id: Option<EventId>,
    pub after_timestamp: Option<DateTime<Utc>>,
}

const EVENT_COLUMNS: &str = "id, session_id, workspace_id, parent_id, sequence, timestamp, \
     type, payload, run_id";

fn row_to_event(row: &Row<'_>) -> rusqlite::Result<SessionEvent> {
    let payload_raw: String = row.get(7)?;
    let type_raw: String = row.get(6)?;
    let event_type: EventType = type_raw.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(SessionEvent {
        id: EventId::from_raw(row.get::<_, String>(0)?),
        session_id: SessionId::from_raw(row.get::<_, String>(1)?),
        workspace_id: WorkspaceId::from_raw(row.get::<_, String>(2)?),
        parent_id: row.get::<_, Option<String>>(3)?.map(EventId::from_raw),
        sequence: row.get(4)?,
        timestamp: crate::records::parse_ts(&row.get::<_, String>(5)?),
        event_type,
        payload: serde_json::from_str(&payload_raw).unwrap_or(Value::Null),
        run_id: row.get::<_, Option<String>>(8)?.map(RunId::from_raw),
    })
}

/// Append an event, assigning `sequence`, `parent_id` and `timestamp`, and
/// updating the session aggregates and search index in the same
/// transaction.
pub fn append(tx: &Transaction<'_>, req: &AppendEvent) -> Result<SessionEvent> {
    let (workspace_id, head_event_id): (String, Option<String>) = tx
        .query_row(
            "SELECT workspace_id, head_event_id FROM sessions WHERE id = ?1",
            [req.session_id.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("session {}", req.session_id)))?;

    if let Some(expected) = &req.expected_parent_id
        && head_event_id.as_deref() != Some(expected.as_str())
    {
        return Err(Error::Constraint(format!(
            "parent {} does not match session head {:?}",
            expected, head_event_id
        )));
    }

    if req.event_type == EventType::SessionStart && head_event_id.is_some() {
        return Err(Error::InvalidOperation(
            "session.start must be the root event".to_string(),
        ));
    }

    let max_seq: i64 = tx.query_row(
        "SELECT COALESCE(MAX(sequence), -1) FROM events WHERE session_id = ?1",
        [req.session_id.as_str()],
        |row| row.get(0),
    )?;

    let event = SessionEvent {
        id: EventId::mint(),
        session_id: req.session_id.clone(),
        workspace_id: WorkspaceId::from_raw(workspace_id),
        parent_id: head_event_id.map(EventId::from_raw),
        sequence: max_seq + 1,
        timestamp: Utc::now(),
        event_type: req.event_type,
        payload: req.payload.clone(),
        run_id: req.run_id.clone(),
    };

    insert_event(tx, &event)?;
    apply_aggregates(tx, &event)?;

    Ok(event)
}

/// Insert a fully formed event row plus its FTS index entry. Used by
/// `append` and by fork materialization, which re-mints IDs but keeps
/// payloads and timestamps.
pub(crate) fn insert_event(tx: &Transaction<'_>, event: &SessionEvent) -> Result<()> {
    let fields = payload_index_fields(event.event_type, &event.payload);

    tx.execute(
        "INSERT INTO events (id, session_id, workspace_id, parent_id, sequence, timestamp, \
         type, payload, turn, tool_name, tool_call_id, input_tokens, output_tokens, run_id) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            event.id.as_str(),
            event.session_id.as_str(),
            event.workspace_id.as_str(),
            event.parent_id.as_ref().map(EventId::as_str),
            event.sequence,
            event.timestamp.to_rfc3339(),
            event.event_type.as_str(),
            serde_json::to_string(&event.payload)?,
            fields.turn.map(|t| t as i64),
            fields.tool_name,
            fields.tool_call_id,
            fields.input_tokens.map(|t| t as i64),
            fields.output_tokens.map(|t| t as i64),
            event.run_id.as_ref().map(RunId::as_str),
        ],
    )?;

    if let Some(content) = search::fts_content(event.event_type, &event.payload) {
        let rowid = tx.last_insert_rowid();
        search::fts_insert(tx, rowid, &content, event.event_type, &event.session_id)?;
    }

    Ok(())
}

/// Fold one event into the session row caches.
pub(crate) fn apply_aggregates(tx: &Transaction<'_>, event: &SessionEvent) -> Result<()> {
    tx.execute(
        "UPDATE sessions SET head_event_id = ?1, last_activity_at = ?2 WHERE id = ?3",
        params![
            event.id.as_str(),
            event.timestamp.to_rfc3339(),
            event.session_id.as_str()
        ],
    )?;

    match event.event_type {
        EventType::MessageAssistant => {
            let stop_reason = event
                .payload
                .get("stopReason")
                .and_then(Value::as_str)
                .unwrap_or("end_turn");
            if stop_reason != "tool_use" {
                tx.execute(
                    "UPDATE sessions SET turn_count = turn_count + 1 WHERE id = ?1",
                    [event.session_id.as_str()],
                )?;
            }

            let usage = |key: &str| {
                event
                    .payload
                    .pointer(&format!("/tokenUsage/{key}"))
                    .and_then(Value::as_u64)
                    .unwrap_or(0) as i64
            };
            tx.execute(
                "UPDATE sessions SET \
                 total_input_tokens = total_input_tokens + ?1, \
                 total_output_tokens = total_output_tokens + ?2, \
                 total_cache_read_tokens = total_cache_read_tokens + ?3, \
                 total_cache_creation_tokens = total_cache_creation_tokens + ?4 \
                 WHERE id = ?5",
                params![
                    usage("inputTokens"),
                    usage("outputTokens"),
                    usage("cacheReadTokens"),
                    usage("cacheCreationTokens"),
                    event.session_id.as_str()
                ],
            )?;
        }
        EventType::ConfigModelSwitch => {
            if let Some(new_model) = event.payload.get("newModel").and_then(Value::as_str) {
                tx.execute(
                    "UPDATE sessions SET model = ?1 WHERE id = ?2",
                    params![new_model, event.session_id.as_str()],
                )?;
            }
        }
        EventType::SessionStart => {
            if let Some(model) = event.payload.get("model").and_then(Value::as_str) {
                tx.execute(
                    "UPDATE sessions SET model = ?1 WHERE id = ?2",
                    params![model, event.session_id.as_str()],
                )?;
            }
        }
        EventType::SessionEnd => {
            tx.execute(
                "UPDATE sessions SET ended_at = ?1 WHERE id = ?2",
                params![event.timestamp.to_rfc3339(), event.session_id.as_str()],
            )?;
        }
        _ => {}
    }

    Ok(())
}

pub fn get(conn: &Connection, event_id: &EventId) -> Result<Option<SessionEvent>> {
    let row = conn
        .query_row(
            &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"),
            [event_id.as_str()],
            row_to_event,
        )
        .optional()?;
    Ok(row)
}

/// The linear chain from the session root to `event_id` inclusive, in
/// sequence order. The chain is linear by construction, so ancestors are
/// exactly the events with a smaller-or-equal sequence.
pub fn ancestors(conn: &Connection, event_id: &EventId) -> Result<Vec<SessionEvent>> {
    let (session_id, sequence): (String, i64) = conn
        .query_row(
            "SELECT session_id, sequence FROM events WHERE id = ?1",
            [event_id.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("event {event_id}")))?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {EVENT_COLUMNS} FROM events \
         WHERE session_id = ?1 AND sequence <= ?2 ORDER BY sequence ASC"
    ))?;
    let events = stmt
        .query_map(params![session_id, sequence], row_to_event)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(events)
}

pub fn list_by_session(
    conn: &Connection,
    session_id: &SessionId,
    query: &EventQuery,
) -> Result<Vec<SessionEvent>> {
    let mut clauses = vec!["session_id = ?".to_string()];
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(session_id.as_str().to_string())];

    if let Some(types) = &query.types
        && !types.is_empty()
    {
        let placeholders = vec!["?"; types.len()].join(", ");
        clauses.push(format!("type IN ({placeholders})"));
        for t in types {
            args.push(Box::new(t.as_str().to_string()));
        }
    }

    if let Some(turn) = query.turn {
        clauses.push("turn = ?".to_string());
        args.push(Box::new(turn as i64));
    }

    if let Some(tool_call_id) = &query.tool_call_id {
        clauses.push("tool_call_id = ?".to_string());
        args.push(Box::new(tool_call_id.clone()));
    }

    if let Some(after) = &query.after_event_id {
        let after_seq: i64 = conn
            .query_row(
                "SELECT sequence FROM events WHERE id = ?1 AND session_id = ?2",
                params![after.as_str(), session_id.as_str()],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("event {after}")))?;
        clauses.push("sequence > ?".to_string());
        args.push(Box::new(after_seq));
    }

    if let Some(after_ts) = &query.after_timestamp {
        clauses.push("timestamp > ?".to_string());
        args.push(Box::new(after_ts.to_rfc3339()));
    }

    let mut sql = format!(
        "SELECT {EVENT_COLUMNS} FROM events WHERE {} ORDER BY sequence ASC",
        clauses.join(" AND ")
    );
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
        if let Some(offset) = query.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
    }

    let mut stmt = conn.prepare(&sql)?;
    let events = stmt
        .query_map(rusqlite::params_from_iter(args.iter()), row_to_event)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(events)
}

/// The most recent `limit` events, still returned in ascending order.
pub fn list_recent(
    conn: &Connection,
    session_id: &SessionId,
    limit: usize,
) -> Result<Vec<SessionEvent>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EVENT_COLUMNS} FROM events WHERE session_id = ?1 \
         ORDER BY sequence DESC LIMIT ?2"
    ))?;
    let mut events = stmt
        .query_map(params![session_id.as_str(), limit as i64], row_to_event)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    events.reverse();
    Ok(events)
}

/// Events with `sequence > after_sequence` (sync-style query).
pub fn list_since(
    conn: &Connection,
    session_id: &SessionId,
    after_sequence: i64,
    limit: usize,
) -> Result<Vec<SessionEvent>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EVENT_COLUMNS} FROM events \
         WHERE session_id = ?1 AND sequence > ?2 ORDER BY sequence ASC LIMIT ?3"
    ))?;
    let events = stmt
        .query_map(
            params![session_id.as_str(), after_sequence, limit as i64],
            row_to_event,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(events)
}

pub fn count(conn: &Connection, session_id: &SessionId) -> Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM events WHERE session_id = ?1",
        [session_id.as_str()],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

/// Whether a tombstone already targets `event_id` on this session's chain.
pub fn has_tombstone(
    conn: &Connection,
    session_id: &SessionId,
    event_id: &EventId,
) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM events \
         WHERE session_id = ?1 AND type = 'message.deleted' \
         AND json_extract(payload, '$.targetEventId') = ?2",
        params![session_id.as_str(), event_id.as_str()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
