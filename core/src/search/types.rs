//! Result and session types shared by the engine and its clients

use serde::{Deserialize, Serialize};

/// Identifier of a search session, unique for the lifetime of an engine
pub type SessionId = u64;

/// One submatch, addressed in characters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Normalized `file://` URI of the matched file
    pub file_uri: String,
    /// URI of the search root containing the file, empty when none does
    pub root: String,
    /// 1-based line number
    pub line: u64,
    /// 1-based column of the match start
    pub character: usize,
    /// Length of the match
    pub length: usize,
    /// Matched line without its trailing line break
    pub line_text: String,
}

impl SearchResult {
    /// The matched text itself, when the columns are code points
    pub fn matched_text(&self) -> String {
        self.line_text
            .chars()
            .skip(self.character.saturating_sub(1))
            .take(self.length)
            .collect()
    }
}

/// Lifecycle of a search session.
///
/// A session starts `Running` and settles exactly once into one of the
/// terminal states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Running,
    /// The search process exited on its own
    Completed {
        result_count: usize,
        exit_code: Option<i32>,
    },
    /// `maxResults` was reached and the process was stopped early
    Truncated { result_count: usize },
    /// The session was cancelled by the caller
    Cancelled { result_count: usize },
    /// The process could not be started or its output could not be read
    Failed { message: String },
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionState::Running)
    }

    /// Number of results delivered before the session settled
    pub fn result_count(&self) -> usize {
        match self {
            SessionState::Completed { result_count, .. }
            | SessionState::Truncated { result_count }
            | SessionState::Cancelled { result_count } => *result_count,
            SessionState::Running | SessionState::Failed { .. } => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Running => "running",
            SessionState::Completed { .. } => "completed",
            SessionState::Truncated { .. } => "truncated",
            SessionState::Cancelled { .. } => "cancelled",
            SessionState::Failed { .. } => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_serializes_in_client_shape() {
        let result = SearchResult {
            file_uri: "file:///a/b.ts".to_string(),
            root: String::new(),
            line: 5,
            character: 5,
            length: 3,
            line_text: "foo bar baz".to_string(),
        };

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["fileUri"], "file:///a/b.ts");
        assert_eq!(value["lineText"], "foo bar baz");
        assert_eq!(result.matched_text(), "bar");
    }

    #[test]
    fn test_session_state_terminality() {
        assert!(!SessionState::Running.is_terminal());
        let done = SessionState::Cancelled { result_count: 4 };
        assert!(done.is_terminal());
        assert_eq!(done.result_count(), 4);
        assert_eq!(done.as_str(), "cancelled");
    }
}
