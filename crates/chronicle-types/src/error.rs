use std::fmt;

/// Result type for chronicle-types operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the types layer
#[derive(Debug)]
pub enum Error {
    /// Payload JSON did not match the schema for its event type
    PayloadMismatch {
        event_type: String,
        source: serde_json::Error,
    },

    /// Event type string is not part of the closed set
    UnknownEventType(String),

    /// Serialization failed
    Json(serde_json::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::PayloadMismatch { event_type, source } => {
                write!(f, "Payload does not match schema for '{event_type}': {source}")
            }
            Error::UnknownEventType(raw) => write!(f, "Unknown event type: {raw}"),
            Error::Json(err) => write!(f, "JSON error: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::PayloadMismatch { source, .. } => Some(source),
            Error::Json(err) => Some(err),
            Error::UnknownEventType(_) => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}
