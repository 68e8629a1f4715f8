//! Single search execution command

use crate::config::CliConfigLoader;
use crate::output::{OutputMode, ResultPrinter};
use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use wsgrep_core::search::search_channel;
use wsgrep_core::{SearchEvent, SearchOptions, SessionState, WorkspaceSearchEngine};

/// Options of one CLI search
#[derive(Debug, Clone, Default)]
pub struct SearchArgs {
    pub query: String,
    pub roots: Vec<String>,
    pub case_sensitive: bool,
    pub whole_word: bool,
    pub regex: bool,
    pub include_ignored: bool,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub max_results: Option<usize>,
    pub json: bool,
}

/// Run a search and print results as they arrive.
///
/// Returns whether anything matched.
pub async fn search_command(args: SearchArgs, config_loader: CliConfigLoader) -> Result<bool> {
    let settings = config_loader.load().await?;
    if let Some(source) = &settings.source {
        debug!("Using config file: {}", source.display());
    }

    let cwd = std::env::current_dir().context("Failed to determine the current directory")?;
    let roots = resolve_roots(&args.roots)?;

    let mut options = SearchOptions::default()
        .with_match_case(args.case_sensitive || settings.match_case)
        .with_whole_word(args.whole_word)
        .with_regexp(args.regex)
        .with_include_ignored(args.include_ignored)
        .with_max_results(args.max_results);
    options.include = args.include;
    options.exclude = settings.exclude.iter().cloned().chain(args.exclude).collect();

    let (tx, mut rx) = search_channel(settings.engine.channel_capacity);
    let engine = Arc::new(
        WorkspaceSearchEngine::ripgrep(settings.engine.clone()).with_client(Arc::new(tx)),
    );

    debug!("Searching for '{}' in {} root(s)", args.query, roots.len());
    let handle = engine.search(&args.query, &roots, options).await?;
    let session_id = handle.id();

    let mode = if args.json {
        OutputMode::Json
    } else {
        OutputMode::Pretty
    };
    if !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }
    let mut printer =
        ResultPrinter::new(std::io::stdout().lock(), mode, settings.engine.column_unit)
            .with_base_dir(cwd);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut cancelling = false;

    let state = loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(SearchEvent::Results { results, .. }) => {
                    printer
                        .print_batch(&results)
                        .context("Failed to write search results")?;
                }
                Some(SearchEvent::Finished { state, .. }) => break state,
                None => break handle.wait().await,
            },
            _ = &mut ctrl_c, if !cancelling => {
                cancelling = true;
                debug!("Interrupted, cancelling search {}", session_id);
                // Cancel from another task so this loop keeps draining events
                let engine = Arc::clone(&engine);
                tokio::spawn(async move { engine.cancel(session_id).await });
            }
        }
    };

    if let SessionState::Failed { message } = &state {
        return Err(anyhow!("Search failed: {}", message));
    }

    if !args.json {
        eprintln!("{}", printer.summary(&state).dimmed());
    }

    Ok(printer.result_count() > 0)
}

/// Turn root arguments into absolute paths; `file://` URIs pass through
fn resolve_roots(roots: &[String]) -> Result<Vec<String>> {
    if roots.is_empty() {
        let cwd = std::env::current_dir().context("Failed to determine the current directory")?;
        return Ok(vec![cwd.to_string_lossy().into_owned()]);
    }

    roots
        .iter()
        .map(|root| {
            if root.starts_with("file:") {
                return Ok(root.clone());
            }
            let path = PathBuf::from(root);
            std::fs::canonicalize(&path)
                .map(|p| p.to_string_lossy().into_owned())
                .with_context(|| format!("Search root does not exist: {}", path.display()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_roots_canonicalizes_paths() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_string_lossy().into_owned();

        let resolved = resolve_roots(&[root, "file:///srv/code".to_string()]).unwrap();
        assert_eq!(
            PathBuf::from(&resolved[0]),
            std::fs::canonicalize(dir.path()).unwrap()
        );
        assert_eq!(resolved[1], "file:///srv/code");
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let err = resolve_roots(&["/definitely/not/here".to_string()]).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_no_roots_means_current_dir() {
        let resolved = resolve_roots(&[]).unwrap();
        assert_eq!(resolved.len(), 1);
    }
}
