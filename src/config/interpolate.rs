//! Configuration value expansion
//!
//! Path values support:
//! - `~` - Home directory
//! - `$VAR` or `${VAR}` - Environment variable substitution
//!
//! Command substitution (`$(...)` or backticks) is rejected outright. A
//! config value must never be able to run a process.

use anyhow::{bail, Result};

use super::model::Config;

/// Expand `~` and environment variables in a single value
///
/// # Errors
/// * If the value contains command substitution
/// * If it references an unset environment variable
///
/// # Examples
///
/// ```
/// use makegate::config::interpolate::expand;
///
/// std::env::set_var("MAKEGATE_DOC_DIR", "/srv/app");
/// assert_eq!(expand("${MAKEGATE_DOC_DIR}/Makefile").unwrap(), "/srv/app/Makefile");
/// std::env::remove_var("MAKEGATE_DOC_DIR");
/// ```
pub fn expand(value: &str) -> Result<String> {
    if value.contains("$(") || value.contains('`') {
        bail!("Command substitution is not supported in configuration: {}", value);
    }

    match shellexpand::full(value) {
        Ok(expanded) => Ok(expanded.into_owned()),
        Err(e) => bail!("Cannot expand '{}': {}", value, e),
    }
}

/// Expand every path-like value in a Config
pub fn interpolate_config(config: &mut Config) -> Result<()> {
    config.server.working_dir = expand(&config.server.working_dir)?;

    if let Some(ref makefile) = config.server.makefile {
        config.server.makefile = Some(expand(makefile)?);
    }

    if let Some(ref root) = config.server.boundary_root {
        config.server.boundary_root = Some(expand(root)?);
    }

    config.execution.make_command = expand(&config.execution.make_command)?;

    Ok(())
}
