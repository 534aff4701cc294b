use std::fmt;

/// Result type for chronicle-store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the storage layer.
///
/// `Init`, `Full`, `Corrupt` and `Constraint` are non-retryable and surface
/// to the caller as-is. Transient contention (`SQLITE_BUSY`/`LOCKED`) is
/// retried internally and never escapes as an error kind of its own.
#[derive(Debug)]
pub enum Error {
    /// Store could not be opened or migrated to the current schema
    Init(String),

    /// Backing storage is out of space
    Full,

    /// Backing file is corrupt beyond repair
    Corrupt(String),

    /// An invariant of the event chain was violated (a bug, not a runtime
    /// condition)
    Constraint(String),

    /// Requested entity does not exist
    NotFound(String),

    /// Operation rejected for the given target (e.g. deleting a
    /// `session.start` event)
    InvalidOperation(String),

    /// Database operation failed
    Database(rusqlite::Error),

    /// Payload serialization failed
    Json(serde_json::Error),

    /// IO operation failed
    Io(std::io::Error),
}

impl Error {
    /// Classify a rusqlite error into the storage taxonomy.
    pub(crate) fn from_sqlite(err: rusqlite::Error) -> Self {
        use rusqlite::ffi::ErrorCode;

        if let rusqlite::Error::SqliteFailure(inner, _) = &err {
            match inner.code {
                ErrorCode::DiskFull => return Error::Full,
                ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase => {
                    return Error::Corrupt(err.to_string());
                }
                ErrorCode::ConstraintViolation => {
                    return Error::Constraint(err.to_string());
                }
                _ => {}
            }
        }
        Error::Database(err)
    }

    /// Whether the underlying sqlite error is transient lock contention.
    pub(crate) fn is_transient(err: &rusqlite::Error) -> bool {
        use rusqlite::ffi::ErrorCode;
        matches!(
            err,
            rusqlite::Error::SqliteFailure(inner, _)
                if matches!(inner.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Init(msg) => write!(f, "Storage init failed: {msg}"),
            Error::Full => write!(f, "Storage full"),
            Error::Corrupt(msg) => write!(f, "Storage corrupt: {msg}"),
            Error::Constraint(msg) => write!(f, "Constraint violation: {msg}"),
            Error::NotFound(what) => write!(f, "{what} not found"),
            Error::InvalidOperation(msg) => write!(f, "{msg}"),
            Error::Database(err) => write!(f, "Database error: {err}"),
            Error::Json(err) => write!(f, "Payload error: {err}"),
            Error::Io(err) => write!(f, "IO error: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Database(err) => Some(err),
            Error::Json(err) => Some(err),
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::from_sqlite(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<chronicle_types::Error> for Error {
    fn from(err: chronicle_types::Error) -> Self {
        Error::InvalidOperation(err.to_string())
    }
}
