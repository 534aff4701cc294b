use std::fmt;

/// Result type for chronicle-providers operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the provider layer
#[derive(Debug)]
pub enum Error {
    /// Provider response carried no usable token counts. Callers must not
    /// fabricate counts; the turn is persisted and the error recorded as an
    /// `error.agent` event with category `TOKEN_EXTRACTION`.
    TokenExtraction(String),
}

impl Error {
    /// Stable category token for `error.agent` payloads.
    pub fn category(&self) -> &'static str {
        match self {
            Error::TokenExtraction(_) => "TOKEN_EXTRACTION",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::TokenExtraction(msg) => write!(f, "Token extraction failed: {msg}"),
        }
    }
}

impl std::error::Error for Error {}
