//! Gate operations
//!
//! [`GateService`] is the single entry point for the three things a caller
//! can do: list targets, run a target, and read the makefile. Requests flow
//! path check, then guard, then runner, then formatter. Nothing is spawned
//! until every check has passed.

use std::sync::Arc;
use std::time::Duration;

use schemars::JsonSchema;
use serde::Deserialize;

use crate::catalog::{Catalog, TargetFilter};
use crate::context::ServerContext;
use crate::error::{GateError, ValidationError};
use crate::executor::{
    ExecSpec, Execute, ProcessRunner, MAX_TIMEOUT_SECS, MIN_TIMEOUT_SECS,
};
use crate::response::{CatalogResponse, ResultFormatter, RunTargetResponse};

/// A request to run one target
#[derive(Debug, Clone, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ExecutionRequest {
    /// Target name to run (e.g., "build", "test")
    pub target: String,

    /// Timeout in seconds, 1 to 3600 (defaults to the configured timeout)
    #[serde(default, alias = "timeout")]
    #[schemars(range(min = 1, max = 3600))]
    pub timeout_seconds: Option<u64>,
}

impl ExecutionRequest {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            timeout_seconds: None,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_seconds = Some(secs);
        self
    }

    /// The timeout to apply, filling in `default` when unset
    ///
    /// # Errors
    /// * `ValidationError::InvalidTimeout` - If the value is outside 1..=3600
    pub fn resolve_timeout(&self, default: u64) -> Result<u64, ValidationError> {
        let value = self.timeout_seconds.unwrap_or(default);
        if !(MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&value) {
            return Err(ValidationError::InvalidTimeout {
                value,
                min: MIN_TIMEOUT_SECS,
                max: MAX_TIMEOUT_SECS,
            });
        }
        Ok(value)
    }
}

/// Basic sanity check on makefile text before it is handed out
///
/// # Errors
/// * `ValidationError::InvalidMakefile` - If the file is empty or a `.`
///   directive line has no `:`
pub fn check_contents(text: &str) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::InvalidMakefile(
            "Makefile is empty".to_string(),
        ));
    }

    for (idx, line) in text.lines().enumerate() {
        if line.starts_with('.') && !line.contains(':') {
            return Err(ValidationError::InvalidMakefile(format!(
                "line {}: directive '{}' is missing ':'",
                idx + 1,
                line.trim()
            )));
        }
    }

    Ok(())
}

/// Discovery, execution and content operations over one context
#[derive(Debug)]
pub struct GateService<E: Execute = ProcessRunner> {
    ctx: Arc<ServerContext>,
    executor: E,
    formatter: ResultFormatter,
}

impl GateService<ProcessRunner> {
    /// Service backed by a real process runner
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        let runner = ctx.runner();
        Self::with_executor(ctx, runner)
    }
}

impl<E: Execute> GateService<E> {
    /// Service backed by any executor
    pub fn with_executor(ctx: Arc<ServerContext>, executor: E) -> Self {
        let formatter = ctx.formatter();
        Self {
            ctx,
            executor,
            formatter,
        }
    }

    pub fn context(&self) -> &ServerContext {
        &self.ctx
    }

    pub fn formatter(&self) -> &ResultFormatter {
        &self.formatter
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Read the makefile as it is on disk right now
    ///
    /// Bytes that are not UTF-8 (a Latin-1 comment, say) are replaced rather
    /// than failing the whole request.
    async fn read_current(&self) -> Result<String, GateError> {
        let makefile = self.ctx.revalidate_makefile()?;
        let bytes = tokio::fs::read(&makefile).await?;
        Ok(match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!("Makefile is not valid UTF-8, decoding lossily: {}", e);
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        })
    }

    /// Build a fresh catalog from the current file contents
    pub async fn catalog(&self) -> Result<Catalog, GateError> {
        let text = self.read_current().await?;
        Ok(Catalog::build_with(&text, self.ctx.build_options()))
    }

    /// List targets, optionally filtered
    ///
    /// `documented_only` falls back to the configured default when `None`.
    pub async fn list_targets(
        &self,
        pattern: Option<&str>,
        documented_only: Option<bool>,
    ) -> Result<CatalogResponse, GateError> {
        let documented_only = documented_only.unwrap_or(self.ctx.documented_only());
        let filter = TargetFilter::new(pattern, documented_only)?;
        let catalog = self.catalog().await?.filtered(&filter);

        tracing::debug!(
            "Listed {} targets (pattern: {:?}, documented_only: {})",
            catalog.len(),
            pattern,
            documented_only
        );

        Ok(self.formatter.catalog(self.ctx.makefile(), &catalog))
    }

    /// Run one target
    ///
    /// A non-zero exit or a timeout is a normal response, not an `Err`.
    ///
    /// # Errors
    /// * `GateError::Validation` - Bad timeout, bad name or unknown target
    /// * `GateError::Path` - The makefile or working directory left the boundary
    /// * `GateError::Execution` - make could not be started
    pub async fn run_target(
        &self,
        request: &ExecutionRequest,
    ) -> Result<RunTargetResponse, GateError> {
        let timeout_secs = request.resolve_timeout(self.ctx.default_timeout())?;

        let working_dir = self.ctx.revalidate_working_dir()?;
        let makefile = self.ctx.revalidate_makefile()?;

        let catalog = self.catalog().await?;
        self.ctx.guard().authorize(&request.target, &catalog)?;

        let mut spec = ExecSpec::new(&request.target, &working_dir)
            .with_timeout(Duration::from_secs(timeout_secs));
        if let Some(arg) = self.ctx.makefile_arg(&makefile, &working_dir) {
            spec = spec.with_makefile(arg);
        }

        let result = self.executor.execute(&spec).await?;
        Ok(self
            .formatter
            .execution(&request.target, result, timeout_secs))
    }

    /// Current makefile text, after the content sanity check
    pub async fn read_makefile(&self) -> Result<String, GateError> {
        let text = self.read_current().await?;
        check_contents(&text)?;
        Ok(text)
    }

    /// Whether the makefile is still present inside the boundary
    pub fn makefile_available(&self) -> bool {
        self.ctx.revalidate_makefile().is_ok()
    }
}
