//! CLI-specific output implementations
//!
//! Renders search results for the terminal, either grouped by file with
//! highlighted matches or as JSON lines.

pub mod printer;

pub use printer::{OutputMode, ResultPrinter};
