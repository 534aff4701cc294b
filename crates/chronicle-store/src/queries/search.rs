use rusqlite::{params, Connection, Transaction};
use serde_json::Value;

use chronicle_types::{EventId, EventType, SessionId};

use crate::error::Result;

// NOTE: Index Maintenance
//
// The FTS index is written in the same transaction as the event row, keyed
// by the event's SQLite rowid. Vectors are different: embeddings are
// computed by an injected capability after the fact, so `vector_put` is a
// standalone write rather than part of the append transaction.

/// Searchable text for an event, or `None` for types with nothing worth
/// indexing.
pub fn fts_content(event_type: EventType, payload: &Value) -> Option<String> {
    let text = |key: &str| {
        payload
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    match event_type {
        EventType::MessageUser => match payload.get("content") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Array(blocks)) => Some(block_text(blocks)),
            _ => None,
        },
        EventType::MessageAssistant => payload
            .get("content")
            .and_then(Value::as_array)
            .map(|blocks| block_text(blocks)),
        EventType::ToolResult => text("content"),
        EventType::ToolCall => {
            let name = payload.get("name").and_then(Value::as_str)?;
            let args = payload
                .get("arguments")
                .map(|a| a.to_string())
                .unwrap_or_default();
            Some(format!("{name} {args}"))
        }
        EventType::CompactBoundary => text("summary"),
        EventType::NotificationSubagentResult => text("result"),
        EventType::MemoryLedger => text("content"),
        EventType::ErrorAgent => text("message"),
        _ => None,
    }
}

fn block_text(blocks: &[Value]) -> String {
    blocks
        .iter()
        .filter_map(|block| match block.get("type").and_then(Value::as_str) {
            Some("text") => block.get("text").and_then(Value::as_str),
            Some("thinking") => block.get("thinking").and_then(Value::as_str),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn fts_insert(
    tx: &Transaction<'_>,
    rowid: i64,
    content: &str,
    event_type: EventType,
    session_id: &SessionId,
) -> Result<()> {
    tx.execute(
        "INSERT INTO events_fts (rowid, content, type, session_id) VALUES (?1, ?2, ?3, ?4)",
        params![rowid, content, event_type.as_str(), session_id.as_str()],
    )?;
    Ok(())
}

/// A full-text hit with its BM25 score (lower is better).
#[derive(Debug, Clone, PartialEq)]
pub struct FtsHit {
    pub event_id: EventId,
    pub score: f64,
}

/// Options for `fts_search`.
#[derive(Debug, Clone, Default)]
pub struct FtsQuery {
    pub event_type: Option<EventType>,
    pub session_id: Option<SessionId>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Build the FTS5 match expression: terms are quoted individually (so
/// punctuation in user queries cannot break the parser) and combined with
/// OR; type/session filters constrain their mirrored columns.
fn build_match_expr(query: &str, opts: &FtsQuery) -> Option<String> {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect();
    if terms.is_empty() {
        return None;
    }

    let mut expr = format!("content : ({})", terms.join(" OR "));
    if let Some(event_type) = opts.event_type {
        expr.push_str(&format!(" AND type : \"{}\"", event_type.as_str()));
    }
    if let Some(session_id) = &opts.session_id {
        expr.push_str(&format!(" AND session_id : \"{}\"", session_id.as_str()));
    }
    Some(expr)
}

pub fn fts_search(conn: &Connection, query: &str, opts: &FtsQuery) -> Result<Vec<FtsHit>> {
    let Some(match_expr) = build_match_expr(query, opts) else {
        return Ok(Vec::new());
    };

    let limit = opts.limit.unwrap_or(50);
    let offset = opts.offset.unwrap_or(0);

    let mut stmt = conn.prepare(
        "SELECT e.id, bm25(events_fts) AS score \
         FROM events_fts JOIN events e ON e.rowid = events_fts.rowid \
         WHERE events_fts MATCH ?1 \
         ORDER BY score ASC LIMIT ?2 OFFSET ?3",
    )?;
    let hits = stmt
        .query_map(params![match_expr, limit as i64, offset as i64], |row| {
            Ok(FtsHit {
                event_id: EventId::from_raw(row.get::<_, String>(0)?),
                score: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(hits)
}

/// A nearest-neighbor hit with its L2 distance.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub event_id: EventId,
    pub distance: f32,
}

pub fn vector_put(conn: &Connection, event_id: &EventId, embedding: &[f32]) -> Result<()> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }

    conn.execute(
        "INSERT INTO event_vectors (event_id, embedding, dim) VALUES (?1, ?2, ?3) \
         ON CONFLICT(event_id) DO UPDATE SET embedding = ?2, dim = ?3",
        params![event_id.as_str(), bytes, embedding.len() as i64],
    )?;
    Ok(())
}

/// Linear scan over stored embeddings. Fine at the scale of one
/// installation's event log; rows with a different dimensionality are
/// skipped rather than compared.
pub fn vector_search(conn: &Connection, query: &[f32], limit: usize) -> Result<Vec<VectorHit>> {
    let mut stmt =
        conn.prepare("SELECT event_id, embedding FROM event_vectors WHERE dim = ?1")?;
    let mut hits: Vec<VectorHit> = stmt
        .query_map([query.len() as i64], |row| {
            let event_id: String = row.get(0)?;
            let bytes: Vec<u8> = row.get(1)?;
            Ok((event_id, bytes))
        })?
        .filter_map(|row| row.ok())
        .map(|(event_id, bytes)| {
            let distance = l2_distance(query, &bytes);
            VectorHit {
                event_id: EventId::from_raw(event_id),
                distance,
            }
        })
        .collect();

    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    hits.truncate(limit);
    Ok(hits)
}

fn l2_distance(query: &[f32], bytes: &[u8]) -> f32 {
    let stored = bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));

    query
        .iter()
        .zip(stored)
        .map(|(a, b)| (a - b) * (a - b))
        .sum::<f32>()
        .sqrt()
}
