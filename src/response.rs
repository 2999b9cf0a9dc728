//! Caller-facing response shapes
//!
//! Everything a caller sees passes through [`ResultFormatter`], which rewrites
//! the boundary root out of messages and output so absolute server paths are
//! never disclosed.

use std::path::{Path, PathBuf};

use regex::{Captures, Regex};
use serde::Serialize;

use crate::catalog::{Catalog, TargetRecord};
use crate::error::{suggest_fix, ErrorCategory, ErrorInfo, ExecutionError, GateError};
use crate::executor::ExecutionResult;

/// Response of an execution request
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct RunTargetResponse {
    /// Exit code was zero and the run did not time out
    pub success: bool,
    /// Target that was run
    pub target: String,
    pub exit_code: i32,
    /// Merged stdout and stderr (truncated if large)
    pub output: String,
    pub timed_out: bool,
    pub truncated: bool,
    pub duration_ms: u64,
    /// Error information if failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

/// Response of a discovery request
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CatalogResponse {
    /// Makefile path relative to the boundary root
    pub makefile: String,
    pub count: usize,
    pub targets: Vec<TargetRecord>,
    /// Names defined more than once
    pub duplicates: Vec<String>,
}

/// Response for a request rejected before or during execution
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ErrorResponse {
    pub success: bool,
    #[serde(flatten)]
    pub error: ErrorInfo,
}

impl ErrorResponse {
    pub fn category(&self) -> ErrorCategory {
        self.error.error_category
    }
}

/// Maps results and errors into response shapes
#[derive(Debug, Clone)]
pub struct ResultFormatter {
    root: PathBuf,
    /// Root followed by a path separator, a non-name character or end of text
    root_pattern: Option<Regex>,
}

impl ResultFormatter {
    /// Formatter that hides `root` from everything it renders
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let shown = root.display().to_string();
        let root_pattern = if shown.is_empty() || shown == "/" {
            None
        } else {
            Regex::new(&format!(r"{}(/|[^\w.\-]|$)", regex::escape(&shown))).ok()
        };
        Self { root, root_pattern }
    }

    /// Replace the boundary root with a relative form
    ///
    /// Only whole path components are rewritten: `/srv/app/src` becomes `src`
    /// and a bare `/srv/app` becomes `.`, while a sibling such as
    /// `/srv/app-data` is left alone.
    pub fn scrub(&self, text: &str) -> String {
        let Some(ref pattern) = self.root_pattern else {
            return text.to_string();
        };
        pattern
            .replace_all(text, |caps: &Captures| match caps.get(1).map(|m| m.as_str()) {
                Some("/") => String::new(),
                Some(next) => format!(".{}", next),
                None => ".".to_string(),
            })
            .into_owned()
    }

    /// Format a finished execution that was given `timeout_secs` to run
    pub fn execution(
        &self,
        target: &str,
        result: ExecutionResult,
        timeout_secs: u64,
    ) -> RunTargetResponse {
        let output = self.scrub(&result.output);

        let error = if result.timed_out {
            Some(ErrorInfo::from(&ExecutionError::TimedOut {
                target: target.to_string(),
                timeout_secs,
            }))
        } else if result.exit_code != 0 {
            let mut info = ErrorInfo::from(&ExecutionError::NonZeroExit {
                target: target.to_string(),
                exit_code: result.exit_code,
            });
            info.suggestion = suggest_fix(&output);
            Some(info)
        } else {
            None
        };

        RunTargetResponse {
            success: result.success(),
            target: target.to_string(),
            exit_code: result.exit_code,
            output,
            timed_out: result.timed_out,
            truncated: result.truncated,
            duration_ms: result.duration_ms(),
            error,
        }
    }

    /// Format any gate error
    pub fn error(&self, err: &GateError) -> ErrorResponse {
        let mut info = ErrorInfo::from(err);
        info.message = self.scrub(&info.message);
        info.suggestion = info.suggestion.map(|s| self.scrub(&s));
        ErrorResponse {
            success: false,
            error: info,
        }
    }

    /// Format a catalog for discovery
    pub fn catalog(&self, makefile: &Path, catalog: &Catalog) -> CatalogResponse {
        CatalogResponse {
            makefile: self.relative(makefile),
            count: catalog.len(),
            duplicates: catalog.duplicates(),
            targets: catalog.records().to_vec(),
        }
    }

    /// Express `path` relative to the root
    pub fn relative(&self, path: &Path) -> String {
        match path.strip_prefix(&self.root) {
            Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
            Ok(rel) => rel.display().to_string(),
            Err(_) => path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
        }
    }
}

/// Serialize a response for the caller
pub fn render<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        tracing::warn!("Failed to serialize response: {}", e);
        format!(
            "{{\"success\":false,\"error_category\":\"internal\",\"kind\":\"internal\",\"message\":\"Serialization error: {}\"}}",
            e.to_string().replace('"', "'")
        )
    })
}
