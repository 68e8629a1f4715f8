//! Minimal configuration module for wsgrep core
//!
//! Only exports pure data types. All loading logic is in CLI layer.

pub mod types;

pub use types::{ColumnUnit, EngineConfig, SearchOptions};
