//! Configuration loading
//!
//! Handles loading configuration from embedded defaults, files, and environment.

use super::config::AppConfig;
use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

/// Load configuration from files and environment
pub fn load_config() -> Result<AppConfig> {
    build(Config::builder().add_source(File::with_name("config/local").required(false)))
}

fn build(
    overrides: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<AppConfig> {
    let config = Config::builder()
        // 1. Embedded defaults (always available)
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        // 2. File overrides (optional)
        .add_source(overrides.build().context("Failed to read configuration files")?)
        // 3. Environment variables (highest priority), FLOWCHAT_SERVER__BASE_URL etc.
        .add_source(
            Environment::with_prefix("FLOWCHAT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}
