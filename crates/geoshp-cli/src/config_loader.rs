//! Configuration loading utilities for CLI commands

use anyhow::{Context, Result};
use geoshp_core::config::{CliConfigOverrides, LayeredConfig, OverflowPolicy};
use std::path::PathBuf;

use crate::cli::Cli;

/// Picked up from the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "geoshp.toml";

/// Defaults, then the config file, then `GEOSHP_*` variables, then CLI flags
pub fn load_config(cli: &Cli) -> Result<LayeredConfig> {
    let mut config = LayeredConfig::with_defaults();

    let file = match &cli.config {
        Some(path) => Some(path.clone()),
        None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.exists()),
    };
    if let Some(path) = file {
        config = config
            .load_from_file(&path)
            .with_context(|| format!("Failed to load configuration file {}", path.display()))?;
    }

    let mut config = config.load_from_env();
    config.update_from_cli(overrides(cli));
    Ok(config)
}

fn overrides(cli: &Cli) -> CliConfigOverrides {
    CliConfigOverrides {
        charset: cli.charset.clone(),
        overflow: cli.strict.then_some(OverflowPolicy::Fail),
        lock_retry_ms: cli.lock_retry_ms,
        use_index: cli.no_index.then_some(false),
    }
}
