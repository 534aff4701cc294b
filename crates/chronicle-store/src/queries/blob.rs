use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};

use chronicle_types::BlobId;

use crate::error::Result;
use crate::records::{parse_ts, BlobRecord};

/// Store bytes content-addressed; identical content returns the existing
/// ID without writing anything.
pub fn store(conn: &Connection, bytes: &[u8], mime_type: Option<&str>) -> Result<BlobId> {
    let hash = hex_digest(bytes);

    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM blobs WHERE hash = ?1",
            [&hash],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(id) = existing {
        return Ok(BlobId::from_raw(id));
    }

    let id = BlobId::from_hash(&hash);
    conn.execute(
        "INSERT INTO blobs (id, hash, content, mime_type, size_original, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            id.as_str(),
            &hash,
            bytes,
            mime_type,
            bytes.len() as i64,
            Utc::now().to_rfc3339()
        ],
    )?;

    Ok(id)
}

pub fn get(conn: &Connection, blob_id: &BlobId) -> Result<Option<BlobRecord>> {
    let row = conn
        .query_row(
            "SELECT id, hash, content, mime_type, size_original, created_at \
             FROM blobs WHERE id = ?1",
            [blob_id.as_str()],
            |row| {
                Ok(BlobRecord {
                    id: BlobId::from_raw(row.get::<_, String>(0)?),
                    hash: row.get(1)?,
                    content: row.get(2)?,
                    mime_type: row.get(3)?,
                    size_original: row.get::<_, i64>(4)? as u64,
                    created_at: parse_ts(&row.get::<_, String>(5)?),
                })
            },
        )
        .optional()?;
    Ok(row)
}

fn hex_digest(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
