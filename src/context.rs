//! Process-wide context
//!
//! Built once from the loaded [`Config`] and shared behind an `Arc`. Nothing
//! in it changes after construction; every request reads the same values.

use std::path::{Path, PathBuf};

use crate::catalog::BuildOptions;
use crate::config::Config;
use crate::error::{GateError, PathError};
use crate::executor::{ChildEnv, ProcessRunner};
use crate::guard::ExecutionGuard;
use crate::paths::PathValidator;
use crate::response::ResultFormatter;

/// File names make looks for, in the order it tries them
pub const MAKEFILE_NAMES: &[&str] = &["GNUmakefile", "makefile", "Makefile"];

/// Resolved startup configuration
#[derive(Debug, Clone)]
pub struct ServerContext {
    validator: PathValidator,
    makefile: PathBuf,
    working_dir: PathBuf,
    make_command: PathBuf,
    default_timeout: u64,
    max_output: usize,
    env: ChildEnv,
    guard: ExecutionGuard,
    build_options: BuildOptions,
    documented_only: bool,
}

impl ServerContext {
    /// Resolve every path in `config` and freeze the result
    ///
    /// Relative paths are taken from the current directory, except a relative
    /// makefile, which is taken from the working directory.
    ///
    /// # Errors
    /// * `PathError::NotFound` - If the root, working directory or makefile is missing
    /// * `PathError::OutsideBoundary` - If the working directory or makefile escapes the root
    /// * `GateError::Io` - If the current directory cannot be read
    pub fn from_config(config: &Config) -> Result<Self, GateError> {
        let cwd = std::env::current_dir()?;
        let working_dir = cwd.join(&config.server.working_dir);
        let root = config
            .server
            .boundary_root
            .as_ref()
            .map(|r| cwd.join(r))
            .unwrap_or_else(|| working_dir.clone());

        let validator = PathValidator::new(&root)?;
        let working_dir = validator.validate_dir(&working_dir)?;

        let makefile = match config.server.makefile {
            Some(ref path) => validator.validate_file(working_dir.join(path))?,
            None => discover_makefile(&working_dir)
                .ok_or_else(|| PathError::NotFound {
                    path: "Makefile".to_string(),
                })
                .and_then(|found| validator.validate_file(found))?,
        };

        let make_command = resolve_command(&config.execution.make_command);

        tracing::info!(
            "Serving {} from {}",
            validator.display_relative(&makefile),
            validator.root().display()
        );

        Ok(Self {
            makefile,
            working_dir,
            make_command,
            default_timeout: config.execution.default_timeout,
            max_output: config.execution.max_output_size,
            env: ChildEnv::from_current(&config.execution.env_allowlist),
            guard: ExecutionGuard::new(config.execution.allow_unlisted_targets),
            build_options: BuildOptions {
                leading_comments: config.catalog.leading_comments,
            },
            documented_only: config.catalog.documented_only,
            validator,
        })
    }

    /// Canonical makefile path
    pub fn makefile(&self) -> &Path {
        &self.makefile
    }

    /// Canonical working directory
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn root(&self) -> &Path {
        self.validator.root()
    }

    pub fn validator(&self) -> &PathValidator {
        &self.validator
    }

    pub fn make_command(&self) -> &Path {
        &self.make_command
    }

    pub fn default_timeout(&self) -> u64 {
        self.default_timeout
    }

    pub fn max_output(&self) -> usize {
        self.max_output
    }

    pub fn guard(&self) -> ExecutionGuard {
        self.guard
    }

    pub fn build_options(&self) -> BuildOptions {
        self.build_options
    }

    pub fn documented_only(&self) -> bool {
        self.documented_only
    }

    /// Process runner configured from this context
    pub fn runner(&self) -> ProcessRunner {
        ProcessRunner::new(&self.make_command)
            .with_max_output(self.max_output)
            .with_env(self.env.clone())
    }

    pub fn formatter(&self) -> ResultFormatter {
        ResultFormatter::new(self.validator.root())
    }

    /// Re-check the makefile against the boundary
    ///
    /// The file may have been replaced by a symlink since startup.
    pub fn revalidate_makefile(&self) -> Result<PathBuf, PathError> {
        self.validator.validate_file(&self.makefile)
    }

    /// Re-check the working directory against the boundary
    pub fn revalidate_working_dir(&self) -> Result<PathBuf, PathError> {
        self.validator.validate_dir(&self.working_dir)
    }

    /// The `-f` argument make needs, if any
    ///
    /// `None` when make would pick the same file on its own from the working
    /// directory. Otherwise the path relative to the working directory when
    /// possible.
    pub fn makefile_arg(&self, makefile: &Path, working_dir: &Path) -> Option<PathBuf> {
        if discover_makefile(working_dir).as_deref() == Some(makefile) {
            return None;
        }
        Some(
            makefile
                .strip_prefix(working_dir)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| makefile.to_path_buf()),
        )
    }
}

/// First makefile make would pick in `dir`, canonicalized
pub fn discover_makefile(dir: &Path) -> Option<PathBuf> {
    MAKEFILE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
        .and_then(|path| path.canonicalize().ok())
}

/// Resolve the build tool on PATH, keeping the name if lookup fails
fn resolve_command(command: &str) -> PathBuf {
    match which::which(command) {
        Ok(path) => {
            tracing::debug!("Resolved {} to {}", command, path.display());
            path
        }
        Err(e) => {
            tracing::warn!("Could not resolve '{}' on PATH: {}", command, e);
            PathBuf::from(command)
        }
    }
}
