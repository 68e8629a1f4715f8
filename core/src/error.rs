//! Error types and handling for wsgrep core

use thiserror::Error;

/// Result type alias for wsgrep operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for wsgrep core
#[derive(Error, Debug)]
pub enum Error {
    /// Search session errors
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised while starting or managing a search session
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("Search query must not be empty")]
    EmptyQuery,

    #[error("At least one root path is required")]
    NoRoots,

    #[error("Invalid root: {root}")]
    InvalidRoot { root: String },

    #[error("Invalid glob pattern '{pattern}': {message}")]
    InvalidGlob { pattern: String, message: String },

    /// The search binary could not be started
    #[error("{message}")]
    Spawn { session_id: u64, message: String },

    #[error("Search process produced no output stream")]
    NoOutput { session_id: u64 },
}

/// Errors raised while mapping byte offsets onto characters
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("Byte offset {byte_offset} is out of range for a line of {line_bytes} bytes")]
    OffsetOutOfRange {
        byte_offset: usize,
        line_bytes: usize,
    },

    #[error("Line text is not valid UTF-8")]
    InvalidUtf8,
}

/// Configuration-specific errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for field '{field}': {value}")]
    InvalidValue { field: String, value: String },
}
