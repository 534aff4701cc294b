use std::fmt;

/// Result type for chronicle-engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the engine layer
#[derive(Debug)]
pub enum Error {
    /// The event chain violates an invariant and cannot be reconstructed.
    /// The session is marked unusable; no auto-repair is attempted.
    Reconstruction { event_id: String, reason: String },

    /// The injected summarizer rejected or failed the job
    Summarizer(String),

    /// Compaction could not run (the message projection is unchanged)
    Compaction(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Reconstruction { event_id, reason } => {
                write!(f, "Reconstruction failed at {event_id}: {reason}")
            }
            Error::Summarizer(msg) => write!(f, "Summarizer error: {msg}"),
            Error::Compaction(msg) => write!(f, "Compaction error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}
