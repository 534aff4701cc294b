use anyhow::Result;
use tempfile::TempDir;

use chronicle_store::{CreateSession, EventStore, SessionRecord};

/// An isolated on-disk store in a temp directory, dropped with the test.
///
/// On-disk rather than in-memory so WAL behavior and reopen-after-restart
/// paths are exercised exactly as in production.
pub struct TestWorld {
    dir: TempDir,
    pub store: EventStore,
}

impl TestWorld {
    pub fn new() -> Result<Self> {
        let dir = TempDir::new()?;
        let store = EventStore::open_or_create(&dir.path().join("events.db"))?;
        Ok(Self { dir, store })
    }

    /// Reopen the same database file, as after a process restart.
    pub fn reopen(&self) -> Result<EventStore> {
        Ok(EventStore::open_or_create(
            &self.dir.path().join("events.db"),
        )?)
    }

    /// Create a session with the given model in a default workspace.
    pub fn session_with_model(&self, model: &str) -> Result<SessionRecord> {
        let (session, _) = self.store.create_session(&CreateSession {
            workspace_path: self.dir.path().to_string_lossy().to_string(),
            working_directory: self.dir.path().to_string_lossy().to_string(),
            model: model.to_string(),
            ..CreateSession::default()
        })?;
        Ok(session)
    }

    pub fn session(&self) -> Result<SessionRecord> {
        self.session_with_model("claude-haiku-4-5-20251001")
    }
}
