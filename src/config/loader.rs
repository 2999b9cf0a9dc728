//! Configuration loader with XDG-compliant path resolution
//!
//! Loads configuration from multiple locations with layered priority:
//! 1. `/etc/makegate/config.toml` (lowest priority)
//! 2. `~/.config/makegate/config.toml`
//! 3. `~/.makegate.toml`
//! 4. `./.makegate.toml`
//! 5. An explicit `--config` file
//! 6. `MAKEGATE_` environment variables (highest priority)

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use super::interpolate::interpolate_config;
use super::model::Config;

/// Application name used for XDG directories
const APP_NAME: &str = "makegate";

/// Prefix for environment overrides
const ENV_PREFIX: &str = "MAKEGATE_";

/// Config file locations, lowest priority first
pub fn config_paths() -> Vec<PathBuf> {
    let system = PathBuf::from("/etc").join(APP_NAME).join("config.toml");
    let user = dirs::config_dir().map(|dir| dir.join(APP_NAME).join("config.toml"));
    let home = dirs::home_dir().map(|dir| dir.join(format!(".{}.toml", APP_NAME)));
    let project = PathBuf::from(format!(".{}.toml", APP_NAME));

    std::iter::once(system)
        .chain(user)
        .chain(home)
        .chain(std::iter::once(project))
        .collect()
}

/// Build the layered figment without extracting it
fn figment(override_path: Option<&Path>) -> Result<Figment> {
    let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

    for path in find_config_files() {
        tracing::debug!("Merging config layer {}", path.display());
        figment = figment.merge(Toml::file(&path));
    }

    if let Some(path) = override_path {
        if !path.is_file() {
            bail!("Config file not found: {}", path.display());
        }
        tracing::debug!("Merging explicit config {}", path.display());
        figment = figment.merge(Toml::file(path));
    }

    // Format: MAKEGATE_EXECUTION__DEFAULT_TIMEOUT=60
    // Maps to: execution.default_timeout = 60
    Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
}

/// Load, expand and validate configuration
///
/// # Arguments
/// * `override_path` - Optional config file that takes priority over all files
///
/// # Errors
/// * If an explicit config file is missing
/// * If a layer fails to parse or a value fails expansion
/// * If the merged values fail [`Config::validate`]
pub fn load_config(override_path: Option<&Path>) -> Result<Config> {
    let mut config: Config = figment(override_path)?
        .extract()
        .context("Failed to load configuration")?;

    interpolate_config(&mut config).context("Failed to expand configuration values")?;
    config.validate().context("Invalid configuration")?;

    Ok(config)
}

/// Config files that exist right now, lowest priority first
pub fn find_config_files() -> Vec<PathBuf> {
    config_paths().into_iter().filter(|p| p.is_file()).collect()
}
