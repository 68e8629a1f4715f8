//! Configuration types for wsgrep core
//!
//! Core only accepts fully resolved, validated configuration.
//! All discovery, loading, and merging happens in CLI layer.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default per-file match cap passed to ripgrep as `--max-count`
pub const DEFAULT_MAX_COUNT_PER_FILE: u32 = 100;

/// Default capacity of channel-based result consumers
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Options for a single workspace search, as sent by the workbench client
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchOptions {
    /// Case-sensitive matching (case-insensitive when false)
    pub match_case: bool,
    /// Only match whole words; forces regex mode internally
    pub match_whole_word: bool,
    /// Treat the query as a regular expression instead of literal text
    pub use_reg_exp: bool,
    /// Search files that ignore files would normally hide
    pub include_ignored: bool,
    /// Restrict the search to paths matching these globs
    pub include: Vec<String>,
    /// Skip paths matching these globs
    pub exclude: Vec<String>,
    /// Stop the search once this many results were delivered
    pub max_results: Option<usize>,
}

impl SearchOptions {
    pub fn with_match_case(mut self, match_case: bool) -> Self {
        self.match_case = match_case;
        self
    }

    pub fn with_whole_word(mut self, whole_word: bool) -> Self {
        self.match_whole_word = whole_word;
        self
    }

    pub fn with_regexp(mut self, use_reg_exp: bool) -> Self {
        self.use_reg_exp = use_reg_exp;
        self
    }

    pub fn with_include_ignored(mut self, include_ignored: bool) -> Self {
        self.include_ignored = include_ignored;
        self
    }

    pub fn with_include<S: Into<String>>(mut self, pattern: S) -> Self {
        self.include.push(pattern.into());
        self
    }

    pub fn with_exclude<S: Into<String>>(mut self, pattern: S) -> Self {
        self.exclude.push(pattern.into());
        self
    }

    pub fn with_max_results(mut self, max_results: Option<usize>) -> Self {
        self.max_results = max_results;
        self
    }

    /// Whether the query is handed to ripgrep as a regular expression
    pub fn is_regex_mode(&self) -> bool {
        self.use_reg_exp || self.match_whole_word
    }
}

/// Unit used for `character` and `length` in search results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnUnit {
    /// Unicode scalar values
    #[default]
    CodePoint,
    /// UTF-16 code units, as used by JavaScript strings and Monaco
    Utf16,
}

impl ColumnUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnUnit::CodePoint => "code_point",
            ColumnUnit::Utf16 => "utf16",
        }
    }

    /// Width of a single character in this unit
    pub fn width(&self, c: char) -> usize {
        match self {
            ColumnUnit::CodePoint => 1,
            ColumnUnit::Utf16 => c.len_utf16(),
        }
    }
}

/// A fully resolved engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Path (or bare name) of the ripgrep-compatible binary
    pub rg_path: PathBuf,
    /// Value passed to `--max-count`
    pub max_count_per_file: u32,
    /// Unit for result columns and lengths
    pub column_unit: ColumnUnit,
    /// Capacity of channel-based consumers
    pub channel_capacity: usize,
}

impl EngineConfig {
    pub fn new<P: Into<PathBuf>>(rg_path: P) -> Self {
        Self {
            rg_path: rg_path.into(),
            ..Self::default()
        }
    }

    pub fn with_column_unit(mut self, unit: ColumnUnit) -> Self {
        self.column_unit = unit;
        self
    }

    pub fn with_max_count_per_file(mut self, max_count: u32) -> Self {
        self.max_count_per_file = max_count;
        self
    }

    /// Look a bare `rg_path` up on PATH once, so spawning a session does not.
    /// Names that cannot be found are kept as given.
    pub fn with_resolved_rg_path(mut self) -> Self {
        if let Ok(path) = which::which(&self.rg_path) {
            self.rg_path = path;
        }
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rg_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingField {
                field: "rg_path".to_string(),
            });
        }

        if self.max_count_per_file == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_count_per_file".to_string(),
                value: "0".to_string(),
            });
        }

        if self.channel_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "channel_capacity".to_string(),
                value: "0".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rg_path: PathBuf::from("rg"),
            max_count_per_file: DEFAULT_MAX_COUNT_PER_FILE,
            column_unit: ColumnUnit::CodePoint,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}
