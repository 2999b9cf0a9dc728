//! Configuration model for makegate
//!
//! Defines the structure for XDG-compliant layered configuration.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::executor::{
    DEFAULT_ALLOWLIST, DEFAULT_TIMEOUT_SECS, MAX_OUTPUT_SIZE, MAX_TIMEOUT_SECS, MIN_TIMEOUT_SECS,
};

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct Config {
    /// Where the makefile lives and how far paths may reach
    #[serde(default)]
    pub server: ServerConfig,

    /// Process runner settings
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Target discovery settings
    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// Location settings, fixed for the life of the process
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ServerConfig {
    /// Makefile path; discovered in `working_dir` when unset
    #[serde(default)]
    pub makefile: Option<String>,

    /// Directory make runs in
    #[serde(default = "default_working_dir")]
    pub working_dir: String,

    /// Paths may not resolve outside this directory; defaults to `working_dir`
    #[serde(default)]
    pub boundary_root: Option<String>,
}

fn default_working_dir() -> String {
    ".".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            makefile: None,
            working_dir: default_working_dir(),
            boundary_root: None,
        }
    }
}

/// Process runner configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ExecutionConfig {
    /// Build tool, looked up on PATH when not absolute
    #[serde(default = "default_make_command")]
    pub make_command: String,

    /// Timeout in seconds when a request gives none
    #[serde(default = "default_timeout")]
    pub default_timeout: u64,

    /// Output ceiling in bytes
    #[serde(default = "default_max_output_size")]
    pub max_output_size: usize,

    /// Run well-formed names that are missing from the catalog
    #[serde(default)]
    pub allow_unlisted_targets: bool,

    /// Variables passed through to make
    #[serde(default = "default_env_allowlist")]
    pub env_allowlist: Vec<String>,
}

fn default_make_command() -> String {
    "make".to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_max_output_size() -> usize {
    MAX_OUTPUT_SIZE
}

fn default_env_allowlist() -> Vec<String> {
    DEFAULT_ALLOWLIST.iter().map(|s| s.to_string()).collect()
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            make_command: default_make_command(),
            default_timeout: default_timeout(),
            max_output_size: default_max_output_size(),
            allow_unlisted_targets: false,
            env_allowlist: default_env_allowlist(),
        }
    }
}

/// Target discovery configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct CatalogConfig {
    /// Only list targets with a `##` description
    #[serde(default)]
    pub documented_only: bool,

    /// Fall back to the comment block above a rule for its description
    #[serde(default)]
    pub leading_comments: bool,
}

impl Config {
    /// Reject values the gate cannot run with
    pub fn validate(&self) -> Result<()> {
        let timeout = self.execution.default_timeout;
        if !(MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&timeout) {
            bail!(
                "execution.default_timeout must be between {} and {} seconds, got {}",
                MIN_TIMEOUT_SECS,
                MAX_TIMEOUT_SECS,
                timeout
            );
        }

        if self.execution.max_output_size == 0 {
            bail!("execution.max_output_size must be greater than zero");
        }

        if self.execution.make_command.trim().is_empty() {
            bail!("execution.make_command must not be empty");
        }

        if self.server.working_dir.trim().is_empty() {
            bail!("server.working_dir must not be empty");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();

        assert_eq!(config.server.working_dir, ".");
        assert!(config.server.makefile.is_none());
        assert!(config.server.boundary_root.is_none());
        assert_eq!(config.execution.make_command, "make");
        assert_eq!(config.execution.default_timeout, 300);
        assert_eq!(config.execution.max_output_size, 100_000);
        assert!(!config.execution.allow_unlisted_targets);
        assert!(config.execution.env_allowlist.contains(&"PATH".to_string()));
        assert!(!config.catalog.documented_only);
        assert!(!config.catalog.leading_comments);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml_config() {
        let toml = r#"
            [server]
            makefile = "build/project.mk"
            working_dir = "/srv/app"

            [execution]
            default_timeout = 60
            allow_unlisted_targets = true
            env_allowlist = ["PATH", "CI"]

            [catalog]
            documented_only = true
        "#;

        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.server.makefile.as_deref(), Some("build/project.mk"));
        assert_eq!(config.server.working_dir, "/srv/app");
        assert_eq!(config.execution.default_timeout, 60);
        assert!(config.execution.allow_unlisted_targets);
        assert_eq!(config.execution.env_allowlist, vec!["PATH", "CI"]);
        // Unset fields keep their defaults
        assert_eq!(config.execution.make_command, "make");
        assert!(config.catalog.documented_only);
    }

    #[test]
    fn test_validate_timeout_range() {
        let mut config = Config::default();
        config.execution.default_timeout = 0;
        assert!(config.validate().is_err());

        config.execution.default_timeout = 3601;
        assert!(config.validate().is_err());

        config.execution.default_timeout = 3600;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_output_size() {
        let mut config = Config::default();
        config.execution.max_output_size = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_output_size"));
    }

    #[test]
    fn test_validate_empty_command() {
        let mut config = Config::default();
        config.execution.make_command = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
