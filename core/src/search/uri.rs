//! Root and file URI handling
//!
//! Clients name search roots either as `file://` URIs or as absolute paths.
//! ripgrep only understands filesystem paths, and results travel back as URIs.

use crate::error::SearchError;
use std::path::{Path, PathBuf};
use url::Url;

/// A search root with both of its spellings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceRoot {
    /// Normalized `file://` URI reported back in results
    pub uri: String,
    /// Filesystem path handed to the search process
    pub path: PathBuf,
}

impl WorkspaceRoot {
    /// Parse a root given as a `file://` URI or an absolute path
    pub fn parse(root: &str) -> Result<Self, SearchError> {
        let invalid = || SearchError::InvalidRoot {
            root: root.to_string(),
        };

        if root.starts_with("file:") {
            let url = Url::parse(root).map_err(|_| invalid())?;
            let path = url.to_file_path().map_err(|_| invalid())?;
            return Ok(Self {
                uri: url.to_string(),
                path,
            });
        }

        let path = PathBuf::from(root);
        let uri = path_to_file_uri(&path).ok_or_else(invalid)?;
        Ok(Self { uri, path })
    }

    /// Parse every root, failing on the first invalid one
    pub fn parse_all<S: AsRef<str>>(roots: &[S]) -> Result<Vec<Self>, SearchError> {
        if roots.is_empty() {
            return Err(SearchError::NoRoots);
        }
        roots.iter().map(|r| Self::parse(r.as_ref())).collect()
    }
}

/// Convert an absolute path into a `file://` URI
pub fn path_to_file_uri(path: &Path) -> Option<String> {
    Url::from_file_path(path).ok().map(|url| url.to_string())
}

/// URI of the most specific root containing `file`, or an empty string
pub fn owning_root<'a>(roots: &'a [WorkspaceRoot], file: &Path) -> &'a str {
    roots
        .iter()
        .filter(|root| file.starts_with(&root.path))
        .max_by_key(|root| root.path.components().count())
        .map(|root| root.uri.as_str())
        .unwrap_or("")
}
