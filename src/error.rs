//! Error types for makegate
//!
//! Every failure the gate can report falls into one of four categories
//! (`path`, `validation`, `execution`, `internal`). Each variant also has a
//! stable `kind` tag so callers can branch on it without parsing messages.

use serde::Serialize;
use thiserror::Error;

/// Failures of the path validator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// Resolved path escapes the boundary root
    #[error("Path is outside the project boundary: {path}")]
    OutsideBoundary { path: String },

    /// Path does not exist
    #[error("Path not found: {path}")]
    NotFound { path: String },

    /// Path exists but is not the expected kind of entry
    #[error("Path is not a {expected}: {path}")]
    WrongKind {
        path: String,
        expected: &'static str,
    },
}

/// Failures of the execution guard and request checks
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Name contains characters outside the allowed set
    #[error("Invalid target name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// Name is well formed but not defined in the makefile
    #[error("Target '{name}' not found")]
    UnknownTarget {
        name: String,
        available: Vec<String>,
        suggestion: Option<String>,
    },

    /// Requested timeout is out of range
    #[error("Timeout must be between {min} and {max} seconds, got {value}")]
    InvalidTimeout { value: u64, min: u64, max: u64 },

    /// Discovery filter is not a valid glob
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// The makefile content failed the basic sanity check
    #[error("Makefile validation failed: {0}")]
    InvalidMakefile(String),
}

/// Failures of the process runner
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// The build tool could not be started
    #[error("Failed to spawn command: {command}")]
    SpawnFailed { command: String, error: String },

    /// The target ran past its deadline and its process group was killed
    #[error("Target '{target}' exceeded {timeout_secs}s timeout")]
    TimedOut { target: String, timeout_secs: u64 },

    /// The target finished with a non-zero exit code
    #[error("Target '{target}' failed with exit code {exit_code}")]
    NonZeroExit { target: String, exit_code: i32 },
}

/// Top-level error for gate operations
#[derive(Error, Debug)]
pub enum GateError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// Unexpected fault inside the gate itself
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stable category tag reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Path,
    Validation,
    Execution,
    Internal,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCategory::Path => "path",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Execution => "execution",
            ErrorCategory::Internal => "internal",
        };
        f.write_str(s)
    }
}

impl PathError {
    pub fn kind(&self) -> &'static str {
        match self {
            PathError::OutsideBoundary { .. } => "outside_boundary",
            PathError::NotFound { .. } => "not_found",
            PathError::WrongKind { .. } => "wrong_kind",
        }
    }
}

impl ValidationError {
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::InvalidName { .. } => "invalid_name",
            ValidationError::UnknownTarget { .. } => "unknown_target",
            ValidationError::InvalidTimeout { .. } => "invalid_timeout",
            ValidationError::InvalidPattern { .. } => "invalid_pattern",
            ValidationError::InvalidMakefile(_) => "invalid_makefile",
        }
    }
}

impl ExecutionError {
    pub fn kind(&self) -> &'static str {
        match self {
            ExecutionError::SpawnFailed { .. } => "spawn_failed",
            ExecutionError::TimedOut { .. } => "timed_out",
            ExecutionError::NonZeroExit { .. } => "non_zero_exit",
        }
    }
}

impl GateError {
    /// Category tag for the caller-facing response
    pub fn category(&self) -> ErrorCategory {
        match self {
            GateError::Path(_) => ErrorCategory::Path,
            GateError::Validation(_) => ErrorCategory::Validation,
            GateError::Execution(_) => ErrorCategory::Execution,
            GateError::Internal(_) | GateError::Io(_) => ErrorCategory::Internal,
        }
    }

    /// Stable kind tag within the category
    pub fn kind(&self) -> &'static str {
        match self {
            GateError::Path(e) => e.kind(),
            GateError::Validation(e) => e.kind(),
            GateError::Execution(e) => e.kind(),
            GateError::Internal(_) | GateError::Io(_) => "internal",
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        GateError::Internal(msg.into())
    }
}

/// Serializable error info for MCP responses
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ErrorInfo {
    pub error_category: ErrorCategory,
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub available: Vec<String>,
}

impl ErrorInfo {
    fn new(category: ErrorCategory, kind: &str, message: String) -> Self {
        Self {
            error_category: category,
            kind: kind.to_string(),
            message,
            suggestion: None,
            exit_code: None,
            available: vec![],
        }
    }

    fn with_suggestion(mut self, suggestion: Option<String>) -> Self {
        self.suggestion = suggestion;
        self
    }
}

impl From<&ExecutionError> for ErrorInfo {
    fn from(err: &ExecutionError) -> Self {
        let info = ErrorInfo::new(ErrorCategory::Execution, err.kind(), err.to_string());
        match err {
            ExecutionError::SpawnFailed { error, .. } => info.with_suggestion(Some(format!(
                "Check that the build tool is installed and executable: {}",
                error
            ))),
            ExecutionError::TimedOut { .. } => info.with_suggestion(Some(
                "Increase timeout_seconds or check whether the recipe hangs".to_string(),
            )),
            ExecutionError::NonZeroExit { exit_code, .. } => ErrorInfo {
                exit_code: Some(*exit_code),
                ..info
            },
        }
    }
}

impl From<&GateError> for ErrorInfo {
    fn from(err: &GateError) -> Self {
        match err {
            GateError::Path(e) => ErrorInfo::new(ErrorCategory::Path, e.kind(), e.to_string())
                .with_suggestion(Some(
                    "Only files inside the configured project root can be used".to_string(),
                )),
            GateError::Validation(ValidationError::UnknownTarget {
                available,
                suggestion,
                ..
            }) => ErrorInfo {
                available: available.clone(),
                ..ErrorInfo::new(ErrorCategory::Validation, err.kind(), err.to_string())
                    .with_suggestion(suggestion.clone().or_else(|| {
                        Some("Run 'list_targets' to see available targets".to_string())
                    }))
            },
            GateError::Validation(ValidationError::InvalidName { .. }) => {
                ErrorInfo::new(ErrorCategory::Validation, err.kind(), err.to_string())
                    .with_suggestion(Some(
                        "Target names may only contain letters, digits, '.', '_' and '-'"
                            .to_string(),
                    ))
            }
            GateError::Validation(e) => {
                ErrorInfo::new(ErrorCategory::Validation, e.kind(), e.to_string())
            }
            GateError::Execution(e) => ErrorInfo::from(e),
            GateError::Internal(_) | GateError::Io(_) => {
                ErrorInfo::new(ErrorCategory::Internal, err.kind(), err.to_string())
            }
        }
    }
}

/// Suggest fixes for common make diagnostics
pub fn suggest_fix(output: &str) -> Option<String> {
    if output.contains("No rule to make target") {
        return Some(
            "A prerequisite or target is missing. Run 'list_targets' to see available targets."
                .to_string(),
        );
    }

    if output.contains("missing separator") {
        return Some("Recipe lines must start with a tab character, not spaces.".to_string());
    }

    if output.contains("Permission denied") {
        return Some(
            "Permission denied. Check file permissions in the working directory.".to_string(),
        );
    }

    if output.contains("command not found") || output.contains("not found") {
        return Some(
            "A command used by the recipe was not found. Check PATH in [execution].env_allowlist."
                .to_string(),
        );
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_error_category() {
        let err = GateError::from(PathError::OutsideBoundary {
            path: "../etc".to_string(),
        });
        assert_eq!(err.category(), ErrorCategory::Path);
        assert_eq!(err.kind(), "outside_boundary");
        assert_eq!(err.to_string(), "Path is outside the project boundary: ../etc");
    }

    #[test]
    fn test_unknown_target_info() {
        let err = GateError::from(ValidationError::UnknownTarget {
            name: "tset".to_string(),
            available: vec!["build".to_string(), "test".to_string()],
            suggestion: Some("Did you mean 'test'?".to_string()),
        });

        let info = ErrorInfo::from(&err);
        assert_eq!(info.error_category, ErrorCategory::Validation);
        assert_eq!(info.kind, "unknown_target");
        assert_eq!(info.suggestion, Some("Did you mean 'test'?".to_string()));
        assert!(info.available.contains(&"build".to_string()));
    }

    #[test]
    fn test_unknown_target_default_suggestion() {
        let err = GateError::from(ValidationError::UnknownTarget {
            name: "deploy".to_string(),
            available: vec![],
            suggestion: None,
        });

        let info = ErrorInfo::from(&err);
        assert!(info.suggestion.unwrap().contains("list_targets"));
    }

    #[test]
    fn test_execution_error_info() {
        let err = ExecutionError::NonZeroExit {
            target: "test".to_string(),
            exit_code: 2,
        };
        let info = ErrorInfo::from(&err);
        assert_eq!(info.error_category, ErrorCategory::Execution);
        assert_eq!(info.kind, "non_zero_exit");
        assert_eq!(info.exit_code, Some(2));
    }

    #[test]
    fn test_timeout_error_message() {
        let err = ExecutionError::TimedOut {
            target: "sleep10".to_string(),
            timeout_secs: 1,
        };
        assert!(err.to_string().contains("exceeded 1s timeout"));
        assert_eq!(err.kind(), "timed_out");
    }

    #[test]
    fn test_internal_error() {
        let err = GateError::internal("Failed to wait for make: interrupted");
        assert_eq!(err.category(), ErrorCategory::Internal);
        assert_eq!(err.kind(), "internal");
        assert_eq!(
            ErrorInfo::from(&err).message,
            "Internal error: Failed to wait for make: interrupted"
        );
    }

    #[test]
    fn test_io_maps_to_internal() {
        let err = GateError::from(std::io::Error::other("boom"));
        assert_eq!(err.category(), ErrorCategory::Internal);
        assert_eq!(err.kind(), "internal");
    }

    #[test]
    fn test_category_display() {
        assert_eq!(ErrorCategory::Path.to_string(), "path");
        assert_eq!(ErrorCategory::Internal.to_string(), "internal");
    }

    #[test]
    fn test_suggest_fix_no_rule() {
        let suggestion = suggest_fix("make: *** No rule to make target 'deploy'.  Stop.");
        assert!(suggestion.unwrap().contains("list_targets"));
    }

    #[test]
    fn test_suggest_fix_missing_separator() {
        let suggestion = suggest_fix("Makefile:2: *** missing separator.  Stop.");
        assert!(suggestion.unwrap().contains("tab"));
    }

    #[test]
    fn test_suggest_fix_command_not_found() {
        let suggestion = suggest_fix("/bin/sh: 1: cargo: not found");
        assert!(suggestion.unwrap().contains("PATH"));
    }

    #[test]
    fn test_suggest_fix_no_match() {
        assert!(suggest_fix("some random error").is_none());
    }

    #[test]
    fn test_error_info_serialization() {
        let err = GateError::from(ValidationError::InvalidName {
            name: "a;b".to_string(),
            reason: "contains ';'".to_string(),
        });
        let json = serde_json::to_string(&ErrorInfo::from(&err)).unwrap();
        assert!(json.contains("\"error_category\":\"validation\""));
        assert!(json.contains("\"kind\":\"invalid_name\""));
        assert!(!json.contains("exit_code"));
        assert!(!json.contains("available"));
    }
}
