use rusqlite::{params, Connection, OptionalExtension, Row};

use chronicle_types::{EventId, SessionId, WorkspaceId};

use crate::error::Result;
use crate::records::{parse_ts, spawn_type_from_str, spawn_type_to_str, SessionRecord};

const SESSION_COLUMNS: &str = "id, workspace_id, working_directory, model, title, system_prompt, \
     tags, head_event_id, turn_count, total_input_tokens, total_output_tokens, \
     total_cache_read_tokens, total_cache_creation_tokens, total_cost, created_at, \
     last_activity_at, ended_at, parent_session_id, spawn_type, spawn_task";

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<SessionRecord> {
    let tags_raw: Option<String> = row.get(6)?;
    let tags = tags_raw
        .and_then(|raw| serde_json::from_str::<Vec<String>>(&raw).ok())
        .unwrap_or_default();

    Ok(SessionRecord {
        id: SessionId::from_raw(row.get::<_, String>(0)?),
        workspace_id: WorkspaceId::from_raw(row.get::<_, String>(1)?),
        working_directory: row.get(2)?,
        model: row.get(3)?,
        title: row.get(4)?,
        system_prompt: row.get(5)?,
        tags,
        head_event_id: row.get::<_, Option<String>>(7)?.map(EventId::from_raw),
        turn_count: row.get::<_, i64>(8)? as u32,
        total_input_tokens: row.get::<_, i64>(9)? as u64,
        total_output_tokens: row.get::<_, i64>(10)? as u64,
        total_cache_read_tokens: row.get::<_, i64>(11)? as u64,
        total_cache_creation_tokens: row.get::<_, i64>(12)? as u64,
        total_cost: row.get(13)?,
        created_at: parse_ts(&row.get::<_, String>(14)?),
        last_activity_at: parse_ts(&row.get::<_, String>(15)?),
        ended_at: row
            .get::<_, Option<String>>(16)?
            .map(|raw| parse_ts(&raw)),
        parent_session_id: row.get::<_, Option<String>>(17)?.map(SessionId::from_raw),
        spawn_type: row
            .get::<_, Option<String>>(18)?
            .and_then(|raw| spawn_type_from_str(&raw)),
        spawn_task: row.get(19)?,
    })
}

pub fn insert(conn: &Connection, session: &SessionRecord) -> Result<()> {
    let tags = if session.tags.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&session.tags)?)
    };

    conn.execute(
        &format!("INSERT INTO sessions ({SESSION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)"),
        params![
            session.id.as_str(),
            session.workspace_id.as_str(),
            &session.working_directory,
            &session.model,
            &session.title,
            &session.system_prompt,
            tags,
            session.head_event_id.as_ref().map(EventId::as_str),
            session.turn_count as i64,
            session.total_input_tokens as i64,
            session.total_output_tokens as i64,
            session.total_cache_read_tokens as i64,
            session.total_cache_creation_tokens as i64,
            session.total_cost,
            session.created_at.to_rfc3339(),
            session.last_activity_at.to_rfc3339(),
            session.ended_at.map(|ts| ts.to_rfc3339()),
            session.parent_session_id.as_ref().map(SessionId::as_str),
            session.spawn_type.map(spawn_type_to_str),
            &session.spawn_task,
        ],
    )?;

    Ok(())
}

pub fn get_by_id(conn: &Connection, session_id: &SessionId) -> Result<Option<SessionRecord>> {
    let row = conn
        .query_row(
            &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"),
            [session_id.as_str()],
            row_to_session,
        )
        .optional()?;
    Ok(row)
}

/// Resolve a full ID or an unambiguous prefix. Ambiguous prefixes resolve
/// to nothing rather than guessing.
pub fn get_by_id_or_prefix(conn: &Connection, id_or_prefix: &str) -> Result<Option<SessionRecord>> {
    if let Some(exact) = get_by_id(conn, &SessionId::from_raw(id_or_prefix))? {
        return Ok(Some(exact));
    }

    let mut stmt = conn.prepare(&format!(
        "SELECT {SESSION_COLUMNS} FROM sessions WHERE id LIKE ?1 LIMIT 2"
    ))?;
    let pattern = format!("{id_or_prefix}%");
    let mut matches: Vec<SessionRecord> = stmt
        .query_map([&pattern], row_to_session)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    match matches.len() {
        1 => Ok(Some(matches.remove(0))),
        _ => Ok(None),
    }
}

pub fn list(
    conn: &Connection,
    workspace_id: Option<&WorkspaceId>,
    limit: usize,
) -> Result<Vec<SessionRecord>> {
    let sessions = if let Some(ws) = workspace_id {
        let mut stmt = conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE workspace_id = ?1 \
             ORDER BY last_activity_at DESC LIMIT ?2"
        ))?;
        stmt.query_map(params![ws.as_str(), limit as i64], row_to_session)?
            .collect::<rusqlite::Result<Vec<_>>>()?
    } else {
        let mut stmt = conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions ORDER BY last_activity_at DESC LIMIT ?1"
        ))?;
        stmt.query_map(params![limit as i64], row_to_session)?
            .collect::<rusqlite::Result<Vec<_>>>()?
    };

    Ok(sessions)
}

/// Update the cached latest model only. Model-switch *events* are produced
/// by callers; this keeps the session row in sync.
pub fn update_model(conn: &Connection, session_id: &SessionId, model: &str) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE sessions SET model = ?1 WHERE id = ?2",
        params![model, session_id.as_str()],
    )?;
    Ok(changed > 0)
}

/// Fold a turn's cost into the session total.
pub fn add_cost(conn: &Connection, session_id: &SessionId, cost: f64) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE sessions SET total_cost = total_cost + ?1 WHERE id = ?2",
        params![cost, session_id.as_str()],
    )?;
    Ok(changed > 0)
}
