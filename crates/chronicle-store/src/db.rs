use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;

use crate::error::{Error, Result};
use crate::schema;

// NOTE: Connection Discipline
//
// One process-wide connection behind a mutex, WAL journal. SQLite's own
// locking makes concurrent readers from other processes safe; within this
// process every access goes through `with_conn`/`with_tx`, so a
// multi-statement update (append + aggregates + indices) is always a single
// transaction and a reader never observes a head pointing at a missing
// event. Transient BUSY/LOCKED failures are retried a bounded number of
// times; everything else surfaces immediately.

const TRANSIENT_RETRIES: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(20);

/// Shared handle to the backing SQLite database.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file, verify WAL mode and run
    /// migrations up to the current schema version.
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Init(format!("cannot open {}: {e}", db_path.display())))?;
        Self::init(conn)
    }

    /// In-memory database for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Init(format!("cannot open in-memory database: {e}")))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| Error::Init(e.to_string()))?;
        conn.busy_timeout(Duration::from_millis(250))
            .map_err(|e| Error::Init(e.to_string()))?;

        // WAL is required for concurrent readers; in-memory databases report
        // "memory" and are accepted as-is.
        let mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(|e| Error::Init(e.to_string()))?;
        if mode != "wal" && mode != "memory" {
            return Err(Error::Init(format!(
                "journal_mode is '{mode}', expected 'wal'"
            )));
        }

        schema::apply_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a read-only (or single-statement) operation on the connection.
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        f(&conn)
    }

    /// Run `f` inside a transaction, committing on success. Transient lock
    /// contention restarts the whole transaction up to a small bound.
    pub fn with_tx<T>(&self, mut f: impl FnMut(&rusqlite::Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock().expect("database mutex poisoned");

        let mut attempt = 0;
        loop {
            let result = Self::run_tx(&mut conn, &mut f);
            match result {
                Err(Error::Database(ref sql_err))
                    if Error::is_transient(sql_err) && attempt < TRANSIENT_RETRIES =>
                {
                    attempt += 1;
                    tracing::debug!(attempt, "retrying transaction after lock contention");
                    std::thread::sleep(RETRY_BACKOFF);
                }
                other => return other,
            }
        }
    }

    fn run_tx<T>(
        conn: &mut Connection,
        f: &mut impl FnMut(&rusqlite::Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let tx = conn.transaction().map_err(Error::from_sqlite)?;
        let value = f(&tx)?;
        tx.commit().map_err(Error::from_sqlite)?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_schema() {
        let db = Database::open_in_memory().unwrap();
        let version = db
            .with_conn(|conn| {
                conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
                    row.get::<_, i64>(0)
                })
                .map_err(Error::from_sqlite)
            })
            .unwrap();
        assert_eq!(version, schema::SCHEMA_VERSION);
    }

    #[test]
    fn open_on_disk_uses_wal() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("events.db")).unwrap();
        let mode: String = db
            .with_conn(|conn| {
                conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))
                    .map_err(Error::from_sqlite)
            })
            .unwrap();
        assert_eq!(mode, "wal");
    }

    #[test]
    fn reopen_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.db");
        drop(Database::open(&path).unwrap());
        Database::open(&path).unwrap();
    }

    #[test]
    fn tx_rolls_back_on_error() {
        let db = Database::open_in_memory().unwrap();
        let result: Result<()> = db.with_tx(|tx| {
            tx.execute(
                "INSERT INTO workspaces (id, path, created_at) VALUES ('ws_x', '/x', 't')",
                [],
            )
            .map_err(Error::from_sqlite)?;
            Err(Error::InvalidOperation("boom".to_string()))
        });
        assert!(result.is_err());

        let count = db
            .with_conn(|conn| {
                conn.query_row("SELECT COUNT(*) FROM workspaces", [], |row| {
                    row.get::<_, i64>(0)
                })
                .map_err(Error::from_sqlite)
            })
            .unwrap();
        assert_eq!(count, 0);
    }
}
