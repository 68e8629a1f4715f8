//! CLI command implementations

pub mod check;
pub mod search;

pub use check::check_command;
pub use search::{search_command, SearchArgs};
