use std::fmt;

/// Result type for chronicle-runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the runtime layer
#[derive(Debug)]
pub enum Error {
    /// Storage layer error
    Store(chronicle_store::Error),

    /// Engine (reconstruction/context) error
    Engine(chronicle_engine::Error),

    /// Provider layer error
    Provider(chronicle_providers::Error),

    /// Message deletion rejected by the store
    MessageDelete(String),

    /// IO operation failed
    Io(std::io::Error),

    /// Configuration error
    Config(String),

    /// Requested entity does not exist
    NotFound(String),

    /// Operation not supported by this provider/session
    NotSupported(String),

    /// Malformed request parameters
    InvalidParams(String),

    /// Invalid operation or state
    InvalidOperation(String),
}

impl Error {
    /// The stable code this error surfaces as on the RPC boundary.
    /// Human-readable messages are rendered there; internal layers trade in
    /// these codes.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Store(chronicle_store::Error::NotFound(_)) | Error::NotFound(_) => "NOT_FOUND",
            Error::Store(_) | Error::Io(_) => "STORAGE_ERROR",
            Error::MessageDelete(_) => "MESSAGE_DELETE_FAILED",
            Error::NotSupported(_) => "NOT_SUPPORTED",
            Error::InvalidParams(_) => "INVALID_PARAMS",
            Error::Engine(_)
            | Error::Provider(_)
            | Error::Config(_)
            | Error::InvalidOperation(_) => "INVALID_OPERATION",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Store(err) => write!(f, "Store error: {err}"),
            Error::Engine(err) => write!(f, "Engine error: {err}"),
            Error::Provider(err) => write!(f, "Provider error: {err}"),
            Error::MessageDelete(msg) => write!(f, "Message delete failed: {msg}"),
            Error::Io(err) => write!(f, "IO error: {err}"),
            Error::Config(msg) => write!(f, "Configuration error: {msg}"),
            Error::NotFound(what) => write!(f, "{what} not found"),
            Error::NotSupported(msg) => write!(f, "Not supported: {msg}"),
            Error::InvalidParams(msg) => write!(f, "Invalid params: {msg}"),
            Error::InvalidOperation(msg) => write!(f, "Invalid operation: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Store(err) => Some(err),
            Error::Engine(err) => Some(err),
            Error::Provider(err) => Some(err),
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<chronicle_store::Error> for Error {
    fn from(err: chronicle_store::Error) -> Self {
        Error::Store(err)
    }
}

impl From<chronicle_engine::Error> for Error {
    fn from(err: chronicle_engine::Error) -> Self {
        Error::Engine(err)
    }
}

impl From<chronicle_providers::Error> for Error {
    fn from(err: chronicle_providers::Error) -> Self {
        Error::Provider(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidOperation(format!("payload serialization failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(Error::NotFound("session".to_string()).code(), "NOT_FOUND");
        assert_eq!(
            Error::Store(chronicle_store::Error::Full).code(),
            "STORAGE_ERROR"
        );
        assert_eq!(
            Error::Store(chronicle_store::Error::NotFound("x".to_string())).code(),
            "NOT_FOUND"
        );
        assert_eq!(
            Error::MessageDelete("no".to_string()).code(),
            "MESSAGE_DELETE_FAILED"
        );
        assert_eq!(
            Error::InvalidParams("bad".to_string()).code(),
            "INVALID_PARAMS"
        );
        assert_eq!(
            Error::NotSupported("model".to_string()).code(),
            "NOT_SUPPORTED"
        );
    }
}
