//! Environment check command

use crate::config::CliConfigLoader;
use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::debug;

/// Resolve the configured ripgrep binary and print its version
pub async fn check_command(config_loader: CliConfigLoader) -> Result<()> {
    let settings = config_loader.load().await?;
    let configured = &settings.engine.rg_path;

    let rg = which::which(configured).with_context(|| {
        format!(
            "Could not find the ripgrep binary '{}'. Install ripgrep or set rg_path",
            configured.display()
        )
    })?;
    debug!("Checking ripgrep at {}", rg.display());

    let output = Command::new(&rg)
        .arg("--version")
        .output()
        .await
        .with_context(|| format!("Failed to run {} --version", rg.display()))?;

    if !output.status.success() {
        bail!(
            "{} --version exited with {}: {}",
            rg.display(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let version = stdout.lines().next().unwrap_or("unknown version");

    println!("ripgrep: {}", rg.display());
    println!("version: {}", version);
    match &settings.source {
        Some(path) => println!("config:  {}", path.display()),
        None => println!("config:  defaults"),
    }

    Ok(())
}
