//! Workspace search: query preparation, the ripgrep process, output parsing
//! and the session engine tying them together

pub mod client;
pub mod engine;
pub mod offset;
pub mod parser;
pub mod process;
pub mod query;
pub mod types;
pub mod uri;

pub use client::{search_channel, SearchClient, SearchEvent};
pub use engine::{SearchHandle, WorkspaceSearchEngine};
pub use offset::{byte_range_length_to_character_length, column_to_byte_offset, CharSpan};
pub use parser::{parse_line, LineBuffer, ResultParser};
pub use process::{
    ChunkStream, ProcessExit, ProcessFactory, ProcessOptions, RipgrepProcessFactory,
    SearchProcess,
};
pub use query::{prepare_query, search_args};
pub use types::{SearchResult, SessionId, SessionState};
pub use uri::WorkspaceRoot;
