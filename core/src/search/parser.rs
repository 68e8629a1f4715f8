//! Incremental parser for ripgrep's `--json` output
//!
//! Output arrives in arbitrary chunks. `LineBuffer` holds back the trailing
//! partial line (raw bytes, so a split UTF-8 sequence survives) until the rest
//! of it arrives; `ResultParser` turns each complete line into results.

use super::offset::byte_span_to_columns;
use super::types::SearchResult;
use super::uri::{owning_root, path_to_file_uri, WorkspaceRoot};
use crate::config::ColumnUnit;
use crate::error::EncodingError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use std::path::PathBuf;

/// Reassembles newline-delimited lines across chunk boundaries
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return every line it completed, without terminators
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.pending.extend_from_slice(chunk);

        let Some(last_newline) = self.pending.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };

        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);

        complete
            .split(|&b| b == b'\n')
            .filter(|line| !line.is_empty())
            .map(<[u8]>::to_vec)
            .collect()
    }

    /// Take the unterminated tail left at end of stream
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }

    /// Bytes currently held back
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[derive(Debug, Deserialize)]
struct RgEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// ripgrep's arbitrary data: `text` when valid UTF-8, base64 `bytes` otherwise
#[derive(Debug, Deserialize)]
struct RgData {
    text: Option<String>,
    bytes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RgMatch {
    path: RgData,
    lines: RgData,
    line_number: u64,
    submatches: Vec<RgSubmatch>,
}

#[derive(Debug, Deserialize)]
struct RgSubmatch {
    start: usize,
    end: usize,
}

#[derive(Debug, Deserialize)]
struct RgSummary {
    elapsed_total: Option<RgElapsed>,
    stats: Option<RgStats>,
}

#[derive(Debug, Deserialize)]
struct RgElapsed {
    human: String,
}

#[derive(Debug, Deserialize)]
struct RgStats {
    matches: u64,
    searches_with_match: u64,
    bytes_searched: u64,
}

/// Turns ripgrep output chunks into `SearchResult` batches
#[derive(Debug)]
pub struct ResultParser {
    buffer: LineBuffer,
    roots: Vec<WorkspaceRoot>,
    unit: ColumnUnit,
}

impl ResultParser {
    pub fn new(roots: Vec<WorkspaceRoot>, unit: ColumnUnit) -> Self {
        Self {
            buffer: LineBuffer::new(),
            roots,
            unit,
        }
    }

    /// Parse every line completed by `chunk`
    pub fn parse_chunk(&mut self, chunk: &[u8]) -> Vec<SearchResult> {
        self.buffer
            .push(chunk)
            .iter()
            .flat_map(|line| parse_line(line, &self.roots, self.unit))
            .collect()
    }

    /// Parse whatever is left once the stream has ended
    pub fn finish(&mut self) -> Vec<SearchResult> {
        match self.buffer.finish() {
            Some(line) => parse_line(&line, &self.roots, self.unit),
            None => Vec::new(),
        }
    }
}

/// Parse one line of ripgrep JSON output.
///
/// Lines that are not JSON, are not `match` events or lack required fields
/// yield no results.
pub fn parse_line(line: &[u8], roots: &[WorkspaceRoot], unit: ColumnUnit) -> Vec<SearchResult> {
    let Ok(envelope) = serde_json::from_slice::<RgEnvelope>(trim_ascii(line)) else {
        return Vec::new();
    };

    match envelope.kind.as_str() {
        "match" => match serde_json::from_value::<RgMatch>(envelope.data) {
            Ok(event) => match_results(event, roots, unit),
            Err(_) => Vec::new(),
        },
        "summary" => {
            if let Ok(summary) = serde_json::from_value::<RgSummary>(envelope.data) {
                log_summary(&summary);
            }
            Vec::new()
        }
        _ => Vec::new(),
    }
}

fn match_results(event: RgMatch, roots: &[WorkspaceRoot], unit: ColumnUnit) -> Vec<SearchResult> {
    let Some(path) = decode_path(&event.path) else {
        return Vec::new();
    };
    let Some(file_uri) = path_to_file_uri(&path) else {
        return Vec::new();
    };
    let Some(raw_line) = event.lines.text else {
        tracing::debug!(path = %path.display(), line = event.line_number, "skipping match: {}", EncodingError::InvalidUtf8);
        return Vec::new();
    };

    let root = owning_root(roots, &path);
    let line_text = raw_line.trim_end_matches(['\r', '\n']);

    event
        .submatches
        .iter()
        .filter_map(|submatch| {
            match byte_span_to_columns(&raw_line, submatch.start, submatch.end, unit) {
                Ok(span) => Some(SearchResult {
                    file_uri: file_uri.clone(),
                    root: root.to_string(),
                    line: event.line_number,
                    character: span.start + 1,
                    length: span.length,
                    line_text: line_text.to_string(),
                }),
                Err(e) => {
                    tracing::debug!(path = %path.display(), line = event.line_number, "skipping submatch: {}", e);
                    None
                }
            }
        })
        .collect()
}

fn decode_path(data: &RgData) -> Option<PathBuf> {
    if let Some(text) = &data.text {
        return Some(PathBuf::from(text));
    }

    let bytes = BASE64.decode(data.bytes.as_deref()?).ok()?;

    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStringExt;
        Some(PathBuf::from(std::ffi::OsString::from_vec(bytes)))
    }

    #[cfg(not(unix))]
    {
        Some(PathBuf::from(String::from_utf8_lossy(&bytes).into_owned()))
    }
}

fn log_summary(summary: &RgSummary) {
    if let Some(stats) = &summary.stats {
        tracing::debug!(
            matches = stats.matches,
            files_with_matches = stats.searches_with_match,
            bytes_searched = stats.bytes_searched,
            elapsed = summary
                .elapsed_total
                .as_ref()
                .map(|e| e.human.as_str())
                .unwrap_or("?"),
            "ripgrep summary"
        );
    }
}

fn trim_ascii(line: &[u8]) -> &[u8] {
    let start = line
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(line.len());
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &line[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOO_MATCH: &str = r#"{"type":"match","data":{"path":{"text":"/a/b.ts"},"lines":{"text":"foo bar baz\n"},"line_number":5,"absolute_offset":0,"submatches":[{"match":{"text":"bar"},"start":4,"end":7}]}}"#;

    fn roots() -> Vec<WorkspaceRoot> {
        WorkspaceRoot::parse_all(&["/a"]).unwrap()
    }

    #[test]
    fn test_line_buffer_holds_partial_lines() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.push(b"{\"a\":").is_empty());
        assert_eq!(buffer.pending_len(), 5);

        let lines = buffer.push(b"1}\n{\"b\"");
        assert_eq!(lines, vec![b"{\"a\":1}".to_vec()]);

        let lines = buffer.push(b":2}\n\n");
        assert_eq!(lines, vec![b"{\"b\":2}".to_vec()]);
        assert!(buffer.finish().is_none());
    }

    #[test]
    fn test_line_buffer_flushes_tail() {
        let mut buffer = LineBuffer::new();
        buffer.push(b"one\ntwo");
        assert_eq!(buffer.finish(), Some(b"two".to_vec()));
        assert!(buffer.finish().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_parse_match_event() {
        let results = parse_line(FOO_MATCH.as_bytes(), &roots(), ColumnUnit::CodePoint);

        assert_eq!(
            results,
            vec![SearchResult {
                file_uri: "file:///a/b.ts".to_string(),
                root: "file:///a".to_string(),
                line: 5,
                character: 5,
                length: 3,
                line_text: "foo bar baz".to_string(),
            }]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_malformed_lines_are_skipped() {
        let mut parser = ResultParser::new(roots(), ColumnUnit::CodePoint);
        let chunk = format!("{}\n{{\"type\":\"match\",\"data\":\n", FOO_MATCH);

        let results = parser.parse_chunk(chunk.as_bytes());
        assert_eq!(results.len(), 1);
        assert!(parser.finish().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_non_match_events_yield_nothing() {
        let begin = br#"{"type":"begin","data":{"path":{"text":"/a/b.ts"}}}"#;
        let summary = br#"{"type":"summary","data":{"elapsed_total":{"human":"0.01s","nanos":1,"secs":0},"stats":{"matches":3,"searches_with_match":1,"bytes_searched":120}}}"#;
        let missing_line_number = br#"{"type":"match","data":{"path":{"text":"/a/b.ts"},"lines":{"text":"x"},"submatches":[]}}"#;

        assert!(parse_line(begin, &roots(), ColumnUnit::CodePoint).is_empty());
        assert!(parse_line(summary, &roots(), ColumnUnit::CodePoint).is_empty());
        assert!(parse_line(missing_line_number, &roots(), ColumnUnit::CodePoint).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_split_inside_multibyte_char() {
        let line = r#"{"type":"match","data":{"path":{"text":"/a/中.rs"},"lines":{"text":"中文 test\n"},"line_number":1,"submatches":[{"start":7,"end":11}]}}"#;
        let bytes = format!("{}\n", line).into_bytes();
        // Split inside the first "中" of the line text
        let split = line.find("中文").unwrap() + 1;

        let mut parser = ResultParser::new(roots(), ColumnUnit::CodePoint);
        assert!(parser.parse_chunk(&bytes[..split]).is_empty());
        let results = parser.parse_chunk(&bytes[split..]);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].character, 4);
        assert_eq!(results[0].length, 4);
        assert_eq!(results[0].file_uri, "file:///a/%E4%B8%AD.rs");
    }

    #[cfg(unix)]
    #[test]
    fn test_multiple_submatches_and_bad_offsets() {
        let line = br#"{"type":"match","data":{"path":{"text":"/elsewhere/x.txt"},"lines":{"text":"ab ab\r\n"},"line_number":2,"submatches":[{"start":0,"end":2},{"start":3,"end":5},{"start":3,"end":40}]}}"#;
        let results = parse_line(line, &roots(), ColumnUnit::CodePoint);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].character, 1);
        assert_eq!(results[1].character, 4);
        assert_eq!(results[1].line_text, "ab ab");
        assert_eq!(results[1].root, "");
    }

    #[cfg(unix)]
    #[test]
    fn test_base64_path() {
        // "/a/\xff.txt"
        let line = br#"{"type":"match","data":{"path":{"bytes":"L2Ev/y50eHQ="},"lines":{"text":"hit\n"},"line_number":1,"submatches":[{"start":0,"end":3}]}}"#;
        let results = parse_line(line, &roots(), ColumnUnit::CodePoint);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].file_uri, "file:///a/%FF.txt");
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_line_is_skipped() {
        let line = br#"{"type":"match","data":{"path":{"text":"/a/b.bin"},"lines":{"bytes":"/w=="},"line_number":1,"submatches":[{"start":0,"end":1}]}}"#;
        assert!(parse_line(line, &roots(), ColumnUnit::CodePoint).is_empty());
    }
}
