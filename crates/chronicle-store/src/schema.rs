use rusqlite::Connection;

use crate::error::{Error, Result};

/// Current schema version. Increment and add a migration when changing
/// table definitions.
pub const SCHEMA_VERSION: i64 = 2;

// NOTE: Migration Discipline
//
// The event log is the source of truth for every session, so the schema is
// migrated in place, never dropped. Each migration is a self-contained SQL
// batch; `schema_version` records which ones have been applied and gates
// re-application. A database whose recorded version is AHEAD of this build
// is refused (opening it with old code would write rows newer code cannot
// trust).

const MIGRATIONS: &[(i64, &str)] = &[
    (
        1,
        r#"
        CREATE TABLE workspaces (
            id TEXT PRIMARY KEY,
            path TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL
        );

        CREATE TABLE sessions (
            id TEXT PRIMARY KEY,
            workspace_id TEXT NOT NULL,
            working_directory TEXT NOT NULL,
            model TEXT NOT NULL,
            title TEXT,
            system_prompt TEXT,
            tags TEXT,
            head_event_id TEXT,
            turn_count INTEGER NOT NULL DEFAULT 0,
            total_input_tokens INTEGER NOT NULL DEFAULT 0,
            total_output_tokens INTEGER NOT NULL DEFAULT 0,
            total_cache_read_tokens INTEGER NOT NULL DEFAULT 0,
            total_cache_creation_tokens INTEGER NOT NULL DEFAULT 0,
            total_cost REAL NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            last_activity_at TEXT NOT NULL,
            ended_at TEXT,
            parent_session_id TEXT,
            spawn_type TEXT,
            spawn_task TEXT,
            FOREIGN KEY (workspace_id) REFERENCES workspaces(id)
        );

        CREATE TABLE events (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            sequence INTEGER NOT NULL,
            parent_id TEXT,
            timestamp TEXT NOT NULL,
            type TEXT NOT NULL,
            payload TEXT NOT NULL,
            turn INTEGER,
            tool_name TEXT,
            tool_call_id TEXT,
            input_tokens INTEGER,
            output_tokens INTEGER,
            run_id TEXT,
            workspace_id TEXT NOT NULL,
            UNIQUE(session_id, sequence),
            FOREIGN KEY (session_id) REFERENCES sessions(id)
        );

        CREATE INDEX idx_events_session_seq ON events(session_id, sequence);
        CREATE INDEX idx_events_tool_call ON events(tool_call_id) WHERE tool_call_id IS NOT NULL;
        CREATE INDEX idx_sessions_workspace ON sessions(workspace_id);
        CREATE INDEX idx_sessions_activity ON sessions(last_activity_at DESC);

        CREATE TABLE blobs (
            id TEXT PRIMARY KEY,
            hash TEXT NOT NULL UNIQUE,
            content BLOB NOT NULL,
            mime_type TEXT,
            size_original INTEGER NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE logs (
            timestamp TEXT NOT NULL,
            level_num INTEGER NOT NULL,
            level TEXT NOT NULL,
            component TEXT NOT NULL,
            session_id TEXT,
            message TEXT NOT NULL,
            error_message TEXT,
            data TEXT
        );

        CREATE INDEX idx_logs_session ON logs(session_id) WHERE session_id IS NOT NULL;
        "#,
    ),
    (
        2,
        r#"
        CREATE VIRTUAL TABLE events_fts USING fts5(content, type, session_id);

        CREATE TABLE event_vectors (
            event_id TEXT PRIMARY KEY,
            embedding BLOB NOT NULL,
            dim INTEGER NOT NULL,
            FOREIGN KEY (event_id) REFERENCES events(id)
        );
        "#,
    ),
];

/// Apply pending migrations sequentially, recording each in
/// `schema_version`.
pub fn apply_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );
        "#,
    )
    .map_err(|e| Error::Init(format!("cannot create schema_version: {e}")))?;

    let current: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .map_err(|e| Error::Init(e.to_string()))?;

    if current > SCHEMA_VERSION {
        return Err(Error::Init(format!(
            "database schema version {current} is newer than supported version {SCHEMA_VERSION}"
        )));
    }

    for (version, sql) in MIGRATIONS {
        if *version <= current {
            continue;
        }
        conn.execute_batch(sql)
            .map_err(|e| Error::Init(format!("migration {version} failed: {e}")))?;
        conn.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![version, chrono::Utc::now().to_rfc3339()],
        )
        .map_err(|e| Error::Init(format!("recording migration {version} failed: {e}")))?;
        tracing::info!(version, "applied schema migration");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_ordered_and_dense() {
        for (i, (version, _)) in MIGRATIONS.iter().enumerate() {
            assert_eq!(*version, i as i64 + 1);
        }
        assert_eq!(MIGRATIONS.last().unwrap().0, SCHEMA_VERSION);
    }

    #[test]
    fn fresh_database_reaches_current_version() {
        let conn = Connection::open_in_memory().unwrap();
        apply_migrations(&conn).unwrap();
        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn reapplying_is_a_noop() {
        let conn = Connection::open_in_memory().unwrap();
        apply_migrations(&conn).unwrap();
        apply_migrations(&conn).unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, SCHEMA_VERSION);
    }

    #[test]
    fn newer_database_is_refused() {
        let conn = Connection::open_in_memory().unwrap();
        apply_migrations(&conn).unwrap();
        conn.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (99, 't')",
            [],
        )
        .unwrap();
        let err = apply_migrations(&conn).unwrap_err();
        assert!(matches!(err, Error::Init(_)));
    }
}
