use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use chronicle_types::WorkspaceId;

use crate::error::Result;
use crate::records::{parse_ts, WorkspaceRecord};

/// Look up the workspace for `path`, creating it if absent. Paths are
/// stored as given; callers canonicalize before handing them in.
pub fn get_or_create(conn: &Connection, path: &str) -> Result<WorkspaceRecord> {
    if let Some(existing) = get_by_path(conn, path)? {
        return Ok(existing);
    }

    let record = WorkspaceRecord {
        id: WorkspaceId::mint(),
        path: path.to_string(),
        created_at: Utc::now(),
    };

    conn.execute(
        "INSERT INTO workspaces (id, path, created_at) VALUES (?1, ?2, ?3)",
        params![
            record.id.as_str(),
            &record.path,
            record.created_at.to_rfc3339()
        ],
    )?;

    Ok(record)
}

pub fn get_by_path(conn: &Connection, path: &str) -> Result<Option<WorkspaceRecord>> {
    let row = conn
        .query_row(
            "SELECT id, path, created_at FROM workspaces WHERE path = ?1",
            [path],
            |row| {
                Ok(WorkspaceRecord {
                    id: WorkspaceId::from_raw(row.get::<_, String>(0)?),
                    path: row.get(1)?,
                    created_at: parse_ts(&row.get::<_, String>(2)?),
                })
            },
        )
        .optional()?;
    Ok(row)
}

pub fn get_by_id(conn: &Connection, id: &WorkspaceId) -> Result<Option<WorkspaceRecord>> {
    let row = conn
        .query_row(
            "SELECT id, path, created_at FROM workspaces WHERE id = ?1",
            [id.as_str()],
            |row| {
                Ok(WorkspaceRecord {
                    id: WorkspaceId::from_raw(row.get::<_, String>(0)?),
                    path: row.get(1)?,
                    created_at: parse_ts(&row.get::<_, String>(2)?),
                })
            },
        )
        .optional()?;
    Ok(row)
}
