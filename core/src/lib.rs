//! # wsgrep Core
//!
//! Core library for wsgrep - a streaming workspace search engine driven by
//! ripgrep.
//!
//! The engine spawns `rg --json`, parses its output as it arrives, converts
//! byte offsets into character columns and hands result batches to the
//! registered clients.

// Core modules
pub mod config;
pub mod error;
pub mod search;

// Re-export commonly used types
pub use config::{ColumnUnit, EngineConfig, SearchOptions};
pub use error::{Error, Result};
pub use search::{
    SearchClient, SearchEvent, SearchHandle, SearchResult, SessionId, SessionState,
    WorkspaceSearchEngine,
};

/// Current version of the wsgrep-core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
