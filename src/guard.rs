//! Execution guard
//!
//! The only check a target name passes through before it becomes an argument
//! to the build tool. The character rule is an allow-list: ASCII letters,
//! digits, `.`, `_` and `-`, starting with a letter, digit or `_`. A leading
//! `-` would be read by make as an option and a leading `.` names a special
//! target, so both are rejected.

use crate::catalog::Catalog;
use crate::error::ValidationError;

/// Longest target name the guard accepts
pub const MAX_TARGET_NAME_LEN: usize = 255;

/// Minimum similarity for a "did you mean" suggestion
const SUGGESTION_THRESHOLD: f64 = 0.6;

/// Whether `name` passes the character-class rule
pub fn is_valid_target_name(name: &str) -> bool {
    check_name(name).is_ok()
}

/// Check `name` against the character-class rule only
///
/// # Errors
/// * `ValidationError::InvalidName` - With a reason naming the first offending character
pub fn check_name(name: &str) -> Result<(), ValidationError> {
    let invalid = |reason: String| ValidationError::InvalidName {
        name: name.to_string(),
        reason,
    };

    let first = name
        .chars()
        .next()
        .ok_or_else(|| invalid("name is empty".to_string()))?;

    if name.len() > MAX_TARGET_NAME_LEN {
        return Err(invalid(format!(
            "name is longer than {} bytes",
            MAX_TARGET_NAME_LEN
        )));
    }

    if let Some(bad) = name.chars().find(|c| !is_name_char(*c)) {
        return Err(invalid(describe_char(bad)));
    }

    if !(first.is_ascii_alphanumeric() || first == '_') {
        return Err(invalid(format!("name must not start with '{}'", first)));
    }

    Ok(())
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

fn describe_char(c: char) -> String {
    match c {
        c if c.is_whitespace() => "contains whitespace".to_string(),
        '/' | '\\' => "contains a path separator".to_string(),
        ';' | '|' | '&' | '$' | '>' | '<' | '`' | '(' | ')' | '{' | '}' | '*' | '?' | '['
        | ']' | '!' | '~' | '#' | '\'' | '"' | '=' | ':' | '%' => {
            format!("contains shell metacharacter '{}'", c)
        }
        c if c.is_control() => format!("contains control character {:?}", c),
        c => format!("contains disallowed character '{}'", c),
    }
}

/// Gate between a requested name and process invocation
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionGuard {
    allow_unlisted: bool,
}

impl ExecutionGuard {
    /// Guard that only admits cataloged targets
    pub fn strict() -> Self {
        Self {
            allow_unlisted: false,
        }
    }

    /// Guard that also admits well-formed names missing from the catalog
    pub fn allowing_unlisted() -> Self {
        Self {
            allow_unlisted: true,
        }
    }

    pub fn new(allow_unlisted: bool) -> Self {
        Self { allow_unlisted }
    }

    pub fn allows_unlisted(&self) -> bool {
        self.allow_unlisted
    }

    /// Authorize `name` for execution
    ///
    /// # Errors
    /// * `ValidationError::InvalidName` - If the name fails the character rule
    /// * `ValidationError::UnknownTarget` - If the name is not cataloged and
    ///   unlisted targets are not allowed
    pub fn authorize(&self, name: &str, catalog: &Catalog) -> Result<(), ValidationError> {
        check_name(name)?;

        if self.allow_unlisted || catalog.contains(name) {
            return Ok(());
        }

        let available = catalog.names();
        let suggestion = closest_match(name, &available).map(|m| format!("Did you mean '{}'?", m));

        Err(ValidationError::UnknownTarget {
            name: name.to_string(),
            available,
            suggestion,
        })
    }
}

/// Authorize against the catalog with the strict policy
pub fn authorize(name: &str, catalog: &Catalog) -> Result<(), ValidationError> {
    ExecutionGuard::strict().authorize(name, catalog)
}

fn closest_match<'a>(name: &str, candidates: &'a [String]) -> Option<&'a str> {
    candidates
        .iter()
        .map(|c| (c.as_str(), strsim::normalized_levenshtein(name, c)))
        .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(c, _)| c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn catalog() -> Catalog {
        Catalog::build("build:\ntest: build\nrelease-1.2:\n")
    }

    #[test]
    fn test_valid_names() {
        for name in ["build", "test", "release-1.2", "_internal", "a", "x86_64", "Build.All"] {
            assert!(check_name(name).is_ok(), "name: {}", name);
        }
    }

    #[test]
    fn test_invalid_names() {
        for name in [
            "",
            "-n",
            "--eval=x",
            ".PHONY",
            "a b",
            "a\tb",
            "a/b",
            "../x",
            "a;rm",
            "a|b",
            "a&b",
            "$(X)",
            "a>b",
            "a<b",
            "a`b`",
            "a\nb",
            "VAR=1",
            "ünïcode",
        ] {
            assert!(check_name(name).is_err(), "name: {:?}", name);
        }
    }

    #[test]
    fn test_too_long() {
        let name = "a".repeat(MAX_TARGET_NAME_LEN + 1);
        assert!(check_name(&name).is_err());
        assert!(check_name(&"a".repeat(MAX_TARGET_NAME_LEN)).is_ok());
    }

    #[test]
    fn test_reasons() {
        let reason = |name: &str| match check_name(name).unwrap_err() {
            ValidationError::InvalidName { reason, .. } => reason,
            other => panic!("Unexpected error: {:?}", other),
        };
        assert_eq!(reason("a b"), "contains whitespace");
        assert_eq!(reason("a/b"), "contains a path separator");
        assert_eq!(reason("a;b"), "contains shell metacharacter ';'");
        assert_eq!(reason("-x"), "name must not start with '-'");
        assert_eq!(reason(""), "name is empty");
    }

    #[test]
    fn test_authorize_known() {
        assert!(authorize("build", &catalog()).is_ok());
        assert!(authorize("release-1.2", &catalog()).is_ok());
    }

    #[test]
    fn test_authorize_unknown_with_suggestion() {
        match authorize("tset", &catalog()).unwrap_err() {
            ValidationError::UnknownTarget {
                name,
                available,
                suggestion,
            } => {
                assert_eq!(name, "tset");
                assert_eq!(available, vec!["build", "test", "release-1.2"]);
                assert_eq!(suggestion, Some("Did you mean 'test'?".to_string()));
            }
            other => panic!("Unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_authorize_unknown_without_close_match() {
        match authorize("nonexistent", &catalog()).unwrap_err() {
            ValidationError::UnknownTarget { suggestion, .. } => assert!(suggestion.is_none()),
            other => panic!("Unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_allow_unlisted_still_checks_characters() {
        let guard = ExecutionGuard::allowing_unlisted();
        assert!(guard.authorize("generated-target", &catalog()).is_ok());
        assert!(matches!(
            guard.authorize("x; rm -rf /", &catalog()),
            Err(ValidationError::InvalidName { .. })
        ));
    }

    #[test]
    fn test_invalid_name_checked_before_catalog() {
        let guard = ExecutionGuard::strict();
        assert!(matches!(
            guard.authorize("build;id", &catalog()),
            Err(ValidationError::InvalidName { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_metacharacters_always_rejected(
            prefix in "[a-z]{0,8}",
            meta in prop::sample::select(vec![';', '|', '&', '$', '`', '>', '<', '\n', ' ', '/']),
            suffix in "[a-z0-9;|&$`]{0,8}",
        ) {
            let name = format!("{}{}{}", prefix, meta, suffix);
            let strict = ExecutionGuard::strict().authorize(&name, &catalog());
            let is_invalid_name = matches!(strict, Err(ValidationError::InvalidName { .. }));
            prop_assert!(is_invalid_name);

            let lenient = ExecutionGuard::allowing_unlisted().authorize(&name, &catalog());
            let is_invalid_name = matches!(lenient, Err(ValidationError::InvalidName { .. }));
            prop_assert!(is_invalid_name);
        }

        #[test]
        fn prop_allowed_alphabet_accepted(name in "[A-Za-z0-9_][A-Za-z0-9._-]{0,40}") {
            prop_assert!(check_name(&name).is_ok());
        }
    }
}
