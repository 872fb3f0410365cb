//! Write a default configuration file.

use anyhow::{bail, Context, Result};
use fx_config::AppConfig;
use std::path::Path;
use tracing::info;

use crate::cli::InitArgs;

pub async fn run(args: InitArgs, config_path: &Path) -> Result<()> {
    if config_path.exists() && !args.force {
        bail!(
            "{} already exists; pass --force to overwrite it",
            config_path.display()
        );
    }

    let body = AppConfig::default().to_toml()?;
    if let Some(dir) = config_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    std::fs::write(config_path, body)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    info!(path = %config_path.display(), "default configuration written");
    println!("Wrote default configuration to {}", config_path.display());
    Ok(())
}
