//! Child process environment
//!
//! The build tool never inherits the gate's environment wholesale. It starts
//! from an empty environment and receives only allow-listed variables.
//! Loader injection variables and make's own recursion state are dropped even
//! when an allow-list names them.

use std::collections::BTreeMap;

/// Variables passed through when no allow-list is configured
pub const DEFAULT_ALLOWLIST: &[&str] = &[
    "PATH", "HOME", "LANG", "LC_ALL", "LC_CTYPE", "TERM", "TMPDIR", "USER", "LOGNAME",
];

/// make's recursion and flag variables
const MAKE_STATE_VARS: &[&str] = &["MAKELEVEL", "MAKEFLAGS", "MFLAGS", "MAKEFILES", "GNUMAKEFLAGS"];

/// Prefixes of dynamic-loader variables
const LOADER_PREFIXES: &[&str] = &["LD_", "DYLD_"];

/// Whether a variable may ever reach the child, regardless of allow-list
pub fn is_forbidden(name: &str) -> bool {
    MAKE_STATE_VARS.contains(&name) || LOADER_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Environment handed to each child process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildEnv {
    vars: BTreeMap<String, String>,
}

impl ChildEnv {
    /// Empty environment
    pub fn empty() -> Self {
        Self::default()
    }

    /// Capture the allow-listed variables from the current process
    pub fn from_current<S: AsRef<str>>(allowlist: &[S]) -> Self {
        Self::from_vars(std::env::vars(), allowlist)
    }

    /// Build from an explicit variable source
    pub fn from_vars<I, S>(vars: I, allowlist: &[S]) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
        S: AsRef<str>,
    {
        let allowed: Vec<&str> = allowlist.iter().map(AsRef::as_ref).collect();
        let vars = vars
            .into_iter()
            .filter(|(k, _)| allowed.contains(&k.as_str()))
            .filter(|(k, _)| {
                let keep = !is_forbidden(k);
                if !keep {
                    tracing::debug!("Dropping forbidden variable from child environment: {}", k);
                }
                keep
            })
            .collect();
        Self { vars }
    }

    /// Set a variable unless it is forbidden
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        if !is_forbidden(&key) {
            self.vars.insert(key, value.into());
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Replace the command's environment with this one
    pub fn apply(&self, cmd: &mut tokio::process::Command) {
        cmd.env_clear();
        cmd.envs(self.iter());
    }
}
