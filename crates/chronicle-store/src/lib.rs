// Durable SQLite event store
// Append-only session chains with derived caches and search indices

mod db;
mod error;
mod schema;
mod store;

pub mod queries;
pub mod records;

pub use db::Database;
pub use error::{Error, Result};
pub use records::{BlobRecord, CreateSession, LogRecord, SessionRecord, WorkspaceRecord};
pub use schema::SCHEMA_VERSION;
pub use store::{AppendEvent, EventQuery, EventStore, FtsHit, FtsQuery, LogQuery, VectorHit};
