//! Error types for the script bridge and the internal content pipeline

use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Reasons a single script argument could not be turned into a script fragment
#[derive(Error, Debug)]
pub enum SanitizeError {
    /// The value could not be serialized as JSON
    #[error("argument is not JSON-serializable: {0}")]
    NotSerializable(String),
}

impl From<serde_json::Error> for SanitizeError {
    fn from(err: serde_json::Error) -> Self {
        SanitizeError::NotSerializable(err.to_string())
    }
}

/// Errors that can occur across the bridge
#[derive(Error, Debug)]
pub enum Error {
    /// An argument was rejected by the sanitizer; nothing reached the engine
    #[error("Argument sanitization failed: {0}")]
    Sanitize(#[from] SanitizeError),

    /// The function name is not a plain identifier path
    #[error("Invalid script function name: {0:?}")]
    InvalidFunctionName(String),

    /// Sanitized and raw argument lists disagree (internal invariant)
    #[error("Sanitized {actual} of {expected} script arguments")]
    ArgumentCountMismatch { expected: usize, actual: usize },

    /// The rendering engine reported a failure while evaluating a script
    #[error("Script execution failed: {0}")]
    ScriptError(String),

    /// The UI thread or the target web view is gone
    #[error("Rendering engine unavailable: {0}")]
    EngineUnavailable(String),

    /// No reader-mode entry exists for the URL
    #[error("Not cached: {0}")]
    NotCached(String),

    /// Reader-mode content could not be produced for a request
    #[error("Content unavailable: {0}")]
    ContentUnavailable(String),

    /// An inbound message failed channel or token validation
    #[error("Message rejected on channel {0}")]
    ChannelMismatch(String),

    /// Invalid configuration (duplicate channels, bad config files, ...)
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the pipeline should answer with "not found" rather than a server error
    pub fn is_content_miss(&self) -> bool {
        matches!(self, Error::NotCached(_) | Error::ContentUnavailable(_))
    }
}
