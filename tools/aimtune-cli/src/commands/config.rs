//! Manage the configuration file.

use std::path::PathBuf;

use aimtune_common::config::{config_file_path, AppConfig};
use anyhow::Context;

pub fn init(path: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let path = path.unwrap_or_else(config_file_path);
    if path.exists() && !force {
        anyhow::bail!(
            "Config already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    AppConfig::default()
        .save_to(&path)
        .with_context(|| format!("Failed to write config {}", path.display()))?;
    println!("Config written to: {}", path.display());
    Ok(())
}

pub fn show(path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = match &path {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AppConfig::load(),
    };
    config
        .analysis
        .validate()
        .context("Configuration is invalid")?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
