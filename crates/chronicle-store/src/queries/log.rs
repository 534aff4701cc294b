use rusqlite::{params, Connection};

use chronicle_types::SessionId;

use crate::error::Result;
use crate::records::{parse_ts, LogRecord};

pub fn append(conn: &Connection, record: &LogRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO logs (timestamp, level_num, level, component, session_id, message, \
         error_message, data) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            record.timestamp.to_rfc3339(),
            record.level_num as i64,
            &record.level,
            &record.component,
            record.session_id.as_ref().map(SessionId::as_str),
            &record.message,
            &record.error_message,
            record
                .data
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
        ],
    )?;
    Ok(())
}

/// Options for `get_for_session`.
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    /// Minimum `level_num` (inclusive).
    pub min_level: Option<u8>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

pub fn get_for_session(
    conn: &Connection,
    session_id: &SessionId,
    query: &LogQuery,
) -> Result<Vec<LogRecord>> {
    let min_level = query.min_level.unwrap_or(0) as i64;
    let limit = query.limit.unwrap_or(1000) as i64;
    let offset = query.offset.unwrap_or(0) as i64;

    let mut stmt = conn.prepare(
        "SELECT timestamp, level_num, level, component, session_id, message, error_message, data \
         FROM logs WHERE session_id = ?1 AND level_num >= ?2 \
         ORDER BY timestamp ASC LIMIT ?3 OFFSET ?4",
    )?;

    let records = stmt
        .query_map(
            params![session_id.as_str(), min_level, limit, offset],
            |row| {
                let data_raw: Option<String> = row.get(7)?;
                Ok(LogRecord {
                    timestamp: parse_ts(&row.get::<_, String>(0)?),
                    level_num: row.get::<_, i64>(1)? as u8,
                    level: row.get(2)?,
                    component: row.get(3)?,
                    session_id: row.get::<_, Option<String>>(4)?.map(SessionId::from_raw),
                    message: row.get(5)?,
                    error_message: row.get(6)?,
                    data: data_raw.and_then(|raw| serde_json::from_str(&raw).ok()),
                })
            },
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(records)
}
