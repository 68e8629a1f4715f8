//! Terminal rendering of search results

use colored::Colorize;
use std::io::{self, Write};
use std::path::PathBuf;
use url::Url;
use wsgrep_core::search::column_to_byte_offset;
use wsgrep_core::{ColumnUnit, SearchResult, SessionState};

/// How results are written to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Grouped by file with highlighted matches
    Pretty,
    /// One JSON object per result
    Json,
}

/// Writes result batches as they arrive
pub struct ResultPrinter<W: Write> {
    out: W,
    mode: OutputMode,
    unit: ColumnUnit,
    base_dir: Option<PathBuf>,
    current_file: Option<String>,
    files: usize,
    results: usize,
}

impl<W: Write> ResultPrinter<W> {
    pub fn new(out: W, mode: OutputMode, unit: ColumnUnit) -> Self {
        Self {
            out,
            mode,
            unit,
            base_dir: None,
            current_file: None,
            files: 0,
            results: 0,
        }
    }

    /// Show file paths relative to `dir` when they are below it
    pub fn with_base_dir(mut self, dir: PathBuf) -> Self {
        self.base_dir = Some(dir);
        self
    }

    pub fn print_batch(&mut self, results: &[SearchResult]) -> io::Result<()> {
        for result in results {
            match self.mode {
                OutputMode::Json => {
                    serde_json::to_writer(&mut self.out, result)?;
                    writeln!(self.out)?;
                }
                OutputMode::Pretty => self.print_pretty(result)?,
            }
            self.results += 1;
        }
        self.out.flush()
    }

    fn print_pretty(&mut self, result: &SearchResult) -> io::Result<()> {
        if self.current_file.as_deref() != Some(result.file_uri.as_str()) {
            if self.current_file.is_some() {
                writeln!(self.out)?;
            }
            let path = self.display_path(&result.file_uri);
            writeln!(self.out, "{}", path.purple().bold())?;
            self.current_file = Some(result.file_uri.clone());
            self.files += 1;
        }

        let (before, matched, after) = split_match(result, self.unit);
        writeln!(
            self.out,
            "{}:{}:{}{}{}",
            result.line.to_string().green(),
            result.character,
            before,
            matched.red().bold(),
            after
        )
    }

    fn display_path(&self, file_uri: &str) -> String {
        let Some(path) = Url::parse(file_uri)
            .ok()
            .and_then(|url| url.to_file_path().ok())
        else {
            return file_uri.to_string();
        };

        self.base_dir
            .as_deref()
            .and_then(|base| path.strip_prefix(base).ok())
            .unwrap_or(path.as_path())
            .display()
            .to_string()
    }

    /// Number of results written so far
    pub fn result_count(&self) -> usize {
        self.results
    }

    /// One-line description of how the search ended
    pub fn summary(&self, state: &SessionState) -> String {
        let files = if self.mode == OutputMode::Pretty {
            format!(" in {} {}", self.files, plural(self.files, "file", "files"))
        } else {
            String::new()
        };
        let counted = format!(
            "{} {}{}",
            self.results,
            plural(self.results, "result", "results"),
            files
        );

        match state {
            SessionState::Truncated { .. } => format!("{} (stopped at the result limit)", counted),
            SessionState::Cancelled { .. } => format!("{} (cancelled)", counted),
            SessionState::Completed {
                exit_code: Some(code),
                ..
            } if *code > 1 => format!("{} (ripgrep exited with status {})", counted, code),
            _ => counted,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Split the line into the text before, inside and after the match
fn split_match(result: &SearchResult, unit: ColumnUnit) -> (&str, &str, &str) {
    let text = result.line_text.as_str();
    let start_column = result.character.saturating_sub(1);
    let start = column_to_byte_offset(text, start_column, unit);
    let end = column_to_byte_offset(text, start_column + result.length, unit).max(start);
    (&text[..start], &text[start..end], &text[end..])
}

fn plural<'a>(n: usize, one: &'a str, many: &'a str) -> &'a str {
    if n == 1 {
        one
    } else {
        many
    }
}
