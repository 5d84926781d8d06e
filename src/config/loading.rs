//! Configuration loading functionality.
//!
//! Handles locating the configuration file, creating a default one on first run,
//! parsing, defaults and validation.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::validation::validate_config;
use super::{Config, SurfaceConfig};
use crate::common::constants::*;
use crate::common::utils::private_path;
use crate::surfaces::SurfaceKind;

const CONFIG_FILE_NAME: &str = "ambientr.toml";

/// Global configuration directory, set once at startup
static CONFIG_DIR: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Set the configuration directory for the current process.
/// This can only be called once, typically at startup.
/// Returns an error if already set.
pub fn set_config_dir(dir: Option<String>) -> Result<()> {
    CONFIG_DIR
        .set(dir.map(PathBuf::from))
        .map_err(|_| anyhow::anyhow!("Configuration directory already set"))
}

/// Get the custom configuration directory if one was set.
/// Returns None if using the default directory.
pub fn get_custom_config_dir() -> Option<PathBuf> {
    CONFIG_DIR.get().and_then(|d| d.clone())
}

/// Load configuration using automatic path detection.
///
/// Creates a default configuration file if none exists.
pub fn load() -> Result<Config> {
    let config_path = get_config_path()?;

    if !config_path.exists() {
        super::builder::create_default_config(&config_path)
            .context("Failed to create default config during load")?;
        log_block_start!(
            "Created default configuration at {}",
            private_path(&config_path)
        );
    }

    load_from_path(&config_path).with_context(|| {
        format!(
            "Failed to load configuration from {}",
            private_path(&config_path)
        )
    })
}

/// Load configuration from a specific path.
///
/// This version does NOT create a default config if the path doesn't exist.
pub fn load_from_path(path: &Path) -> Result<Config> {
    if !path.exists() {
        anyhow::bail!("Configuration file not found at {}", private_path(path));
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", private_path(path)))?;

    parse_config(&content)
        .with_context(|| format!("Invalid configuration in {}", private_path(path)))
}

/// Parse, validate and complete a configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let mut config: Config = toml::from_str(content).context("Failed to parse TOML")?;

    validate_config(&config)?;
    apply_defaults(&mut config);

    Ok(config)
}

/// Get the configuration file path.
pub fn get_config_path() -> Result<PathBuf> {
    if let Some(custom_dir) = get_custom_config_dir() {
        return Ok(custom_dir.join(CONFIG_FILE_NAME));
    }

    let config_dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(config_dir.join("ambientr").join(CONFIG_FILE_NAME))
}

/// Fill every missing field with its default so later code never guesses.
fn apply_defaults(config: &mut Config) {
    if config.surface.is_none() {
        config.surface = Some(DEFAULT_SURFACE);
    }
    if config.time_tick_interval_ms.is_none() {
        config.time_tick_interval_ms = Some(DEFAULT_TIME_TICK_INTERVAL_MS);
    }
    if config.sleep_in_ambient.is_none() {
        config.sleep_in_ambient = Some(DEFAULT_SLEEP_IN_AMBIENT);
    }

    for kind in SurfaceKind::ALL {
        let resolved = config.surface_settings(kind);
        *config.surface_config_mut(kind) = Some(SurfaceConfig {
            interactive_interval_ms: Some(resolved.interactive_interval_ms),
            ambient_interval_ms: Some(resolved.ambient_interval_ms),
            ambient_wake: Some(resolved.ambient_wake),
            muted_interval_ms: resolved.muted_interval_ms,
        });
    }
}
