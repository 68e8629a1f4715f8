//! Simple CLI configuration loader for wsgrep
//!
//! Implements single-source priority loading with flag overrides:
//! 1. --config file/dir (highest priority)
//! 2. Current working directory: ./wsgrep.json or ./.wsgrep/config.json
//! 3. Git repository root: <repo_root>/.wsgrep/config.json
//! 4. User config dir: <config_dir>/wsgrep/config.json
//! 5. Defaults only (no files)
//!
//! `WSGREP_*` environment variables are layered over whichever file is used.

use anyhow::{anyhow, Context, Result};
use config::{Config, Environment, File, FileFormat, Map};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use wsgrep_core::{ColumnUnit, EngineConfig};

const ENV_PREFIX: &str = "WSGREP";

/// Raw settings file format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawSettings {
    /// ripgrep binary, a bare name or a path (`~` and `$VAR` are expanded)
    pub rg_path: Option<String>,
    /// Per-file match cap passed to `--max-count`
    pub max_count_per_file: Option<u32>,
    /// `code_point` or `utf16`
    pub column_unit: Option<ColumnUnit>,
    /// Capacity of the result channel
    pub channel_capacity: Option<usize>,
    /// Globs excluded from every search
    pub exclude: Vec<String>,
    /// Case-sensitive search by default
    pub match_case: Option<bool>,
}

/// Configuration after discovery, merging and overrides
#[derive(Debug, Clone)]
pub struct ResolvedSettings {
    pub engine: EngineConfig,
    pub exclude: Vec<String>,
    pub match_case: bool,
    /// File the settings came from, `None` when only defaults applied
    pub source: Option<PathBuf>,
}

/// CLI configuration loader
pub struct CliConfigLoader {
    /// Override config file/directory path
    config_override: Option<PathBuf>,
    /// Flag overrides
    rg_path_override: Option<String>,
    /// Directory discovery starts from, defaults to the process cwd
    working_dir: Option<PathBuf>,
    /// Replaces the process environment as the `WSGREP_*` source
    env_override: Option<Map<String, String>>,
}

impl CliConfigLoader {
    /// Create a new loader
    pub fn new() -> Self {
        Self {
            config_override: None,
            rg_path_override: None,
            working_dir: None,
            env_override: None,
        }
    }

    /// Set config file/directory override
    pub fn with_config_override(mut self, path: PathBuf) -> Self {
        self.config_override = Some(path);
        self
    }

    /// Set ripgrep path override
    pub fn with_rg_path_override(mut self, rg_path: String) -> Self {
        self.rg_path_override = Some(rg_path);
        self
    }

    /// Discover settings relative to `dir` instead of the process cwd
    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }

    /// Read `WSGREP_*` variables from `vars` instead of the environment
    pub fn with_env_source(mut self, vars: Map<String, String>) -> Self {
        self.env_override = Some(vars);
        self
    }

    /// Load and resolve configuration
    pub async fn load(&self) -> Result<ResolvedSettings> {
        // Step 1: Find the settings file
        let source = if let Some(override_path) = &self.config_override {
            Some(self.resolve_override(override_path).with_context(|| {
                format!(
                    "Failed to load config from override path: {}",
                    override_path.display()
                )
            })?)
        } else {
            self.discover()?
        };

        // Step 2: Merge file and environment
        let mut raw = self.merge(source.as_deref())?;

        // Step 3: Apply flag overrides
        if let Some(rg_path) = &self.rg_path_override {
            raw.rg_path = Some(rg_path.clone());
        }

        // Step 4: Resolve to final settings
        self.resolve(raw, source)
    }

    /// Search for a settings file in priority order
    fn discover(&self) -> Result<Option<PathBuf>> {
        let cwd = self.working_dir()?;

        // 1. Current working directory
        let candidates = [
            cwd.join("wsgrep.json"),
            cwd.join(".wsgrep").join("config.json"),
        ];
        if let Some(found) = candidates.into_iter().find(|p| p.is_file()) {
            return Ok(Some(found));
        }

        // 2. Git repository root
        if let Some(git_root) = find_git_root(&cwd) {
            let config_path = git_root.join(".wsgrep").join("config.json");
            if config_path.is_file() {
                return Ok(Some(config_path));
            }
        }

        // 3. User config directory
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("wsgrep").join("config.json");
            if config_path.is_file() {
                return Ok(Some(config_path));
            }
        }

        // 4. Defaults only
        Ok(None)
    }

    /// Resolve a `--config` path (file or directory)
    fn resolve_override(&self, path: &Path) -> Result<PathBuf> {
        if path.is_file() {
            Ok(path.to_path_buf())
        } else if path.is_dir() {
            let config_file = path.join("config.json");
            if config_file.is_file() {
                Ok(config_file)
            } else {
                Err(anyhow!(
                    "No config.json found in directory: {}",
                    path.display()
                ))
            }
        } else {
            Err(anyhow!("Config path does not exist: {}", path.display()))
        }
    }

    fn merge(&self, source: Option<&Path>) -> Result<RawSettings> {
        let mut builder = Config::builder();

        if let Some(path) = source {
            builder = builder.add_source(File::from(path).format(FileFormat::Json).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("exclude")
                .source(self.env_override.clone()),
        );

        let merged = builder.build().with_context(|| match source {
            Some(path) => format!("Failed to read config file: {}", path.display()),
            None => "Failed to read configuration from the environment".to_string(),
        })?;

        merged.try_deserialize().with_context(|| match source {
            Some(path) => format!("Failed to parse config file: {}", path.display()),
            None => "Failed to parse configuration from the environment".to_string(),
        })
    }

    fn resolve(&self, raw: RawSettings, source: Option<PathBuf>) -> Result<ResolvedSettings> {
        let mut engine = EngineConfig::default();

        if let Some(rg_path) = raw.rg_path.as_deref().filter(|p| !p.is_empty()) {
            engine.rg_path = resolve_rg_path(rg_path)?;
        }
        if let Some(max_count) = raw.max_count_per_file {
            engine.max_count_per_file = max_count;
        }
        if let Some(unit) = raw.column_unit {
            engine.column_unit = unit;
        }
        if let Some(capacity) = raw.channel_capacity {
            engine.channel_capacity = capacity;
        }

        // Validate
        engine
            .validate()
            .map_err(|e| anyhow!("Configuration validation failed: {}", e))?;

        Ok(ResolvedSettings {
            engine,
            exclude: raw.exclude,
            match_case: raw.match_case.unwrap_or(false),
            source,
        })
    }

    fn working_dir(&self) -> Result<PathBuf> {
        match &self.working_dir {
            Some(dir) => Ok(dir.clone()),
            None => std::env::current_dir().context("Failed to determine the current directory"),
        }
    }
}

impl Default for CliConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Expand `~`/`$VAR` and look bare names up on PATH.
///
/// A binary that cannot be found is kept as written so the search reports
/// the failure when it tries to start it.
pub fn resolve_rg_path(raw: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(raw)
        .with_context(|| format!("Failed to expand ripgrep path: {}", raw))?;
    let path = PathBuf::from(expanded.into_owned());

    Ok(which::which(&path).unwrap_or(path))
}

/// Find git repository root
fn find_git_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(".git").exists())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn loader_in(dir: &Path) -> CliConfigLoader {
        CliConfigLoader::new()
            .with_working_dir(dir.to_path_buf())
            .with_env_source(Map::new())
    }

    #[tokio::test]
    async fn test_cwd_file_is_used() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("wsgrep.json"),
            r#"{"rg_path": "/opt/rg/bin/rg", "max_count_per_file": 7, "column_unit": "utf16", "exclude": ["target"]}"#,
        )
        .unwrap();

        let settings = loader_in(dir.path()).load().await.unwrap();
        assert_eq!(settings.engine.rg_path, PathBuf::from("/opt/rg/bin/rg"));
        assert_eq!(settings.engine.max_count_per_file, 7);
        assert_eq!(settings.engine.column_unit, ColumnUnit::Utf16);
        assert_eq!(settings.exclude, vec!["target".to_string()]);
        assert_eq!(settings.source, Some(dir.path().join("wsgrep.json")));
    }

    #[tokio::test]
    async fn test_dot_dir_config_and_git_root() {
        let repo = TempDir::new().unwrap();
        std::fs::create_dir(repo.path().join(".git")).unwrap();
        std::fs::create_dir(repo.path().join(".wsgrep")).unwrap();
        std::fs::write(
            repo.path().join(".wsgrep").join("config.json"),
            r#"{"match_case": true}"#,
        )
        .unwrap();
        let nested = repo.path().join("src").join("deep");
        std::fs::create_dir_all(&nested).unwrap();

        let settings = loader_in(&nested).load().await.unwrap();
        assert!(settings.match_case);
        assert_eq!(
            settings.source,
            Some(repo.path().join(".wsgrep").join("config.json"))
        );
    }

    #[tokio::test]
    async fn test_environment_overrides_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("wsgrep.json"),
            r#"{"max_count_per_file": 7, "exclude": ["a"]}"#,
        )
        .unwrap();

        let mut env = Map::new();
        env.insert("WSGREP_MAX_COUNT_PER_FILE".to_string(), "12".to_string());
        env.insert("WSGREP_EXCLUDE".to_string(), "node_modules,dist".to_string());

        let settings = CliConfigLoader::new()
            .with_working_dir(dir.path().to_path_buf())
            .with_env_source(env)
            .load()
            .await
            .unwrap();

        assert_eq!(settings.engine.max_count_per_file, 12);
        assert_eq!(
            settings.exclude,
            vec!["node_modules".to_string(), "dist".to_string()]
        );
    }

    #[tokio::test]
    async fn test_flag_override_wins() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("wsgrep.json"), r#"{"rg_path": "/from/file/rg"}"#).unwrap();

        let settings = loader_in(dir.path())
            .with_rg_path_override("/from/flag/rg".to_string())
            .load()
            .await
            .unwrap();
        assert_eq!(settings.engine.rg_path, PathBuf::from("/from/flag/rg"));
    }

    #[tokio::test]
    async fn test_config_override_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.json"), r#"{"channel_capacity": 3}"#).unwrap();
        let elsewhere = TempDir::new().unwrap();

        let settings = loader_in(elsewhere.path())
            .with_config_override(dir.path().to_path_buf())
            .load()
            .await
            .unwrap();
        assert_eq!(settings.engine.channel_capacity, 3);

        let missing = loader_in(elsewhere.path())
            .with_config_override(dir.path().join("nope.json"))
            .load()
            .await;
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn test_invalid_values_are_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("wsgrep.json"), r#"{"max_count_per_file": 0}"#).unwrap();

        let err = loader_in(dir.path()).load().await.unwrap_err();
        assert!(err.to_string().contains("validation failed"));

        std::fs::write(dir.path().join("wsgrep.json"), "{ not json").unwrap();
        assert!(loader_in(dir.path()).load().await.is_err());
    }

    #[test]
    fn test_resolve_rg_path_expands_variables() {
        std::env::set_var("WSGREP_TEST_RG_DIR", "/opt/tools");
        let path = resolve_rg_path("$WSGREP_TEST_RG_DIR/rg-missing").unwrap();
        assert_eq!(path, PathBuf::from("/opt/tools/rg-missing"));
    }
}
