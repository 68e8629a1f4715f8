//! # wsgrep CLI
//!
//! Command-line interface for wsgrep - streaming workspace search driven by
//! ripgrep.
//!
//! ## Usage
//!
//! - `wsgrep <query> [roots...]` - Search the roots (default: current directory)
//! - `wsgrep --json <query>` - Print one JSON result per line
//! - `wsgrep check` - Show which ripgrep binary would be used
//!
//! Results are printed as ripgrep reports them; Ctrl-C cancels the search.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod output;

use crate::commands::{check_command, search_command, SearchArgs};
use crate::config::CliConfigLoader;

/// wsgrep - streaming workspace search driven by ripgrep
#[derive(Parser)]
#[command(name = "wsgrep")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Search workspace folders with ripgrep and stream the matches")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file or directory path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// ripgrep binary to use
    #[arg(long, global = true, env = "WSGREP_RG_PATH")]
    rg_path: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Match case exactly
    #[arg(short = 's', long)]
    case_sensitive: bool,

    /// Match whole words only
    #[arg(short = 'w', long = "word")]
    whole_word: bool,

    /// Treat the query as a regular expression
    #[arg(short = 'e', long)]
    regex: bool,

    /// Also search files excluded by ignore files and hidden files
    #[arg(short = 'u', long)]
    include_ignored: bool,

    /// Only search files matching this glob (repeatable)
    #[arg(short = 'g', long, value_name = "GLOB")]
    include: Vec<String>,

    /// Skip files matching this glob (repeatable)
    #[arg(short = 'x', long, value_name = "GLOB")]
    exclude: Vec<String>,

    /// Stop after this many results
    #[arg(short = 'm', long, value_name = "N")]
    max_results: Option<usize>,

    /// Print results as JSON lines
    #[arg(long)]
    json: bool,

    /// Text to search for
    query: Option<String>,

    /// Folders or file:// URIs to search
    roots: Vec<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that ripgrep can be found and started
    Check,
}

/// Build a configuration loader from CLI arguments
fn build_config_loader(cli: &Cli) -> CliConfigLoader {
    let mut loader = CliConfigLoader::new();

    if let Some(config_path) = &cli.config {
        loader = loader.with_config_override(config_path.clone());
    }

    if let Some(rg_path) = &cli.rg_path {
        loader = loader.with_rg_path_override(rg_path.clone());
    }

    loader
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; RUST_LOG wins over --verbose
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    let config_loader = build_config_loader(&cli);

    match (cli.query, cli.command) {
        (Some(_), Some(_)) => bail!("Cannot specify both a query and a subcommand"),
        (None, Some(Commands::Check)) => check_command(config_loader).await,
        (None, None) => bail!("A search query is required (see --help)"),
        (Some(query), None) => {
            let args = SearchArgs {
                query,
                roots: cli.roots,
                case_sensitive: cli.case_sensitive,
                whole_word: cli.whole_word,
                regex: cli.regex,
                include_ignored: cli.include_ignored,
                include: cli.include,
                exclude: cli.exclude,
                max_results: cli.max_results,
                json: cli.json,
            };

            let matched = search_command(args, config_loader).await?;
            if !matched {
                // grep convention: 1 means nothing matched
                std::process::exit(1);
            }
            Ok(())
        }
    }
}
