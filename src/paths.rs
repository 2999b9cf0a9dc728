//! Path validation against a project boundary
//!
//! Every path the gate touches (the makefile, the working directory) is
//! resolved to an absolute canonical path and must stay inside the boundary
//! root. The check runs twice:
//!
//! 1. **Lexically**, before touching the filesystem, so `../` escapes are
//!    rejected whether or not the target exists.
//! 2. **Canonically**, after resolving symlinks, so a link inside the root
//!    pointing outside of it is rejected too.
//!
//! Error messages only ever contain the path as the caller supplied it.

use std::path::{Component, Path, PathBuf};

use crate::error::PathError;

/// Validates paths against a fixed boundary root
#[derive(Debug, Clone)]
pub struct PathValidator {
    /// Root as configured, made absolute but not canonicalized
    root: PathBuf,
    /// Canonical form of the root
    canonical_root: PathBuf,
}

impl PathValidator {
    /// Create a validator for the given boundary root
    ///
    /// # Errors
    /// * `PathError::NotFound` - If the root does not exist
    /// * `PathError::WrongKind` - If the root is not a directory
    pub fn new(root: impl AsRef<Path>) -> Result<Self, PathError> {
        let root = root.as_ref();
        let canonical_root = root.canonicalize().map_err(|_| PathError::NotFound {
            path: root.display().to_string(),
        })?;

        if !canonical_root.is_dir() {
            return Err(PathError::WrongKind {
                path: root.display().to_string(),
                expected: "directory",
            });
        }

        let absolute = if root.is_absolute() {
            normalize(root)
        } else {
            std::env::current_dir()
                .map(|cwd| normalize(&cwd.join(root)))
                .unwrap_or_else(|_| canonical_root.clone())
        };

        Ok(Self {
            root: absolute,
            canonical_root,
        })
    }

    /// The canonical boundary root
    pub fn root(&self) -> &Path {
        &self.canonical_root
    }

    /// Resolve `candidate` and confirm it lies within the boundary root
    ///
    /// Relative candidates are interpreted relative to the root.
    ///
    /// # Errors
    /// * `PathError::OutsideBoundary` - If the path escapes the root
    /// * `PathError::NotFound` - If the path does not exist
    pub fn validate(&self, candidate: impl AsRef<Path>) -> Result<PathBuf, PathError> {
        let candidate = candidate.as_ref();
        let shown = candidate.display().to_string();

        // Lexical pass. Accept the path if it sits under either spelling of
        // the root so a symlinked root alias is not rejected early.
        let lexical_ok = [&self.root, &self.canonical_root].iter().any(|root| {
            let joined = if candidate.is_absolute() {
                normalize(candidate)
            } else {
                normalize(&root.join(candidate))
            };
            joined.starts_with(root)
        });
        if !lexical_ok {
            tracing::debug!("Rejected path outside boundary: {}", shown);
            return Err(PathError::OutsideBoundary { path: shown });
        }

        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.canonical_root.join(candidate)
        };

        let resolved = joined
            .canonicalize()
            .map_err(|_| PathError::NotFound { path: shown.clone() })?;

        // Path::starts_with compares whole components, so "/root-other" is
        // not mistaken for a child of "/root".
        if !resolved.starts_with(&self.canonical_root) {
            tracing::debug!("Rejected symlink escaping boundary: {}", shown);
            return Err(PathError::OutsideBoundary { path: shown });
        }

        Ok(resolved)
    }

    /// Validate a path that must be a regular file
    pub fn validate_file(&self, candidate: impl AsRef<Path>) -> Result<PathBuf, PathError> {
        let candidate = candidate.as_ref();
        let resolved = self.validate(candidate)?;
        if !resolved.is_file() {
            return Err(PathError::WrongKind {
                path: candidate.display().to_string(),
                expected: "file",
            });
        }
        Ok(resolved)
    }

    /// Validate a path that must be a directory
    pub fn validate_dir(&self, candidate: impl AsRef<Path>) -> Result<PathBuf, PathError> {
        let candidate = candidate.as_ref();
        let resolved = self.validate(candidate)?;
        if !resolved.is_dir() {
            return Err(PathError::WrongKind {
                path: candidate.display().to_string(),
                expected: "directory",
            });
        }
        Ok(resolved)
    }

    /// Express an absolute path relative to the root, for display
    ///
    /// Falls back to the file name so internal absolute paths never leak.
    pub fn display_relative(&self, path: &Path) -> String {
        match path.strip_prefix(&self.canonical_root) {
            Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
            Ok(rel) => rel.display().to_string(),
            Err(_) => path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "<outside root>".to_string()),
        }
    }
}

/// Validate `candidate` against `boundary_root` in one call
pub fn validate(
    candidate: impl AsRef<Path>,
    boundary_root: impl AsRef<Path>,
) -> Result<PathBuf, PathError> {
    PathValidator::new(boundary_root)?.validate(candidate)
}

/// Collapse `.` and `..` components without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Popping past the root is a no-op, same as the OS
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Makefile"), "build:\n").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        dir
    }

    #[test]
    fn test_validate_inside_root() {
        let dir = project();
        let validator = PathValidator::new(dir.path()).unwrap();

        let resolved = validator.validate("Makefile").unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.starts_with(validator.root()));
    }

    #[test]
    fn test_validate_root_itself() {
        let dir = project();
        let validator = PathValidator::new(dir.path()).unwrap();

        let resolved = validator.validate(".").unwrap();
        assert_eq!(resolved, validator.root());
    }

    #[test]
    fn test_validate_absolute_inside_root() {
        let dir = project();
        let validator = PathValidator::new(dir.path()).unwrap();

        let resolved = validator.validate(dir.path().join("sub")).unwrap();
        assert!(resolved.ends_with("sub"));
    }

    #[test]
    fn test_validate_dot_segments_inside_root() {
        let dir = project();
        let validator = PathValidator::new(dir.path()).unwrap();

        let resolved = validator.validate("sub/../Makefile").unwrap();
        assert!(resolved.ends_with("Makefile"));
    }

    #[test]
    fn test_traversal_rejected_even_if_missing() {
        let dir = project();
        let validator = PathValidator::new(dir.path()).unwrap();

        let err = validator.validate("../definitely-missing-file").unwrap_err();
        assert!(matches!(err, PathError::OutsideBoundary { .. }));
    }

    #[test]
    fn test_traversal_rejected_when_target_exists() {
        let outer = TempDir::new().unwrap();
        fs::write(outer.path().join("secret"), "x").unwrap();
        let inner = outer.path().join("project");
        fs::create_dir(&inner).unwrap();

        let validator = PathValidator::new(&inner).unwrap();
        let err = validator.validate("../secret").unwrap_err();
        assert!(matches!(err, PathError::OutsideBoundary { .. }));
    }

    #[test]
    fn test_absolute_outside_rejected() {
        let dir = project();
        let validator = PathValidator::new(dir.path()).unwrap();

        let err = validator.validate("/etc/passwd").unwrap_err();
        assert_eq!(
            err,
            PathError::OutsideBoundary {
                path: "/etc/passwd".to_string()
            }
        );
    }

    #[test]
    fn test_sibling_prefix_rejected() {
        let outer = TempDir::new().unwrap();
        let root = outer.path().join("app");
        let sibling = outer.path().join("app-other");
        fs::create_dir(&root).unwrap();
        fs::create_dir(&sibling).unwrap();

        let validator = PathValidator::new(&root).unwrap();
        let err = validator.validate(&sibling).unwrap_err();
        assert!(matches!(err, PathError::OutsideBoundary { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_rejected() {
        let outer = TempDir::new().unwrap();
        let root = outer.path().join("project");
        fs::create_dir(&root).unwrap();
        fs::write(outer.path().join("outside.mk"), "x:\n").unwrap();
        std::os::unix::fs::symlink(outer.path().join("outside.mk"), root.join("link.mk"))
            .unwrap();

        let validator = PathValidator::new(&root).unwrap();
        let err = validator.validate("link.mk").unwrap_err();
        assert!(matches!(err, PathError::OutsideBoundary { .. }));
    }

    #[test]
    fn test_missing_inside_root() {
        let dir = project();
        let validator = PathValidator::new(dir.path()).unwrap();

        let err = validator.validate("nope.mk").unwrap_err();
        assert_eq!(
            err,
            PathError::NotFound {
                path: "nope.mk".to_string()
            }
        );
    }

    #[test]
    fn test_missing_root() {
        let err = PathValidator::new("/nonexistent/root/for/makegate").unwrap_err();
        assert!(matches!(err, PathError::NotFound { .. }));
    }

    #[test]
    fn test_validate_file_and_dir_kinds() {
        let dir = project();
        let validator = PathValidator::new(dir.path()).unwrap();

        assert!(validator.validate_file("Makefile").is_ok());
        assert!(validator.validate_dir("sub").is_ok());
        assert!(matches!(
            validator.validate_file("sub").unwrap_err(),
            PathError::WrongKind {
                expected: "file",
                ..
            }
        ));
        assert!(matches!(
            validator.validate_dir("Makefile").unwrap_err(),
            PathError::WrongKind {
                expected: "directory",
                ..
            }
        ));
    }

    #[test]
    fn test_error_shows_supplied_path_only() {
        let dir = project();
        let validator = PathValidator::new(dir.path()).unwrap();

        let err = validator.validate("missing/thing").unwrap_err();
        let root = validator.root().display().to_string();
        assert!(!err.to_string().contains(&root));
    }

    #[test]
    fn test_display_relative() {
        let dir = project();
        let validator = PathValidator::new(dir.path()).unwrap();

        let makefile = validator.validate("Makefile").unwrap();
        assert_eq!(validator.display_relative(&makefile), "Makefile");
        assert_eq!(validator.display_relative(validator.root()), ".");
        assert_eq!(validator.display_relative(Path::new("/etc/passwd")), "passwd");
    }

    #[test]
    fn test_free_function() {
        let dir = project();
        assert!(validate("Makefile", dir.path()).is_ok());
        assert!(matches!(
            validate("../x", dir.path()),
            Err(PathError::OutsideBoundary { .. })
        ));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
        assert_eq!(normalize(Path::new("/../..")), PathBuf::from("/"));
    }
}
