//! Target catalog construction
//!
//! Turns scanned makefile lines into an ordered list of [`TargetRecord`]s.
//! The catalog keeps first-appearance order and keeps duplicate definitions
//! as separate records; it never decides which definition "wins".

use std::collections::HashMap;

use globset::{Glob, GlobMatcher};
use serde::{Deserialize, Serialize};

use super::scanner::{scan, LineKind};
use crate::error::ValidationError;
use crate::guard::is_valid_target_name;

/// One target definition found in the makefile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRecord {
    /// Target name
    pub name: String,
    /// Prerequisites as written on the definition line
    pub dependencies: Vec<String>,
    /// Trailing documentation comment
    pub description: Option<String>,
}

impl TargetRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: vec![],
            description: None,
        }
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }
}

/// Options that change how records are extracted
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    /// Use the comment block directly above a rule when it has no `##` doc
    pub leading_comments: bool,
}

/// Scan `contents` and return every target in first-appearance order
pub fn build(contents: &str) -> Vec<TargetRecord> {
    Catalog::build(contents).into_records()
}

/// Ordered, immutable collection of target records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    records: Vec<TargetRecord>,
}

impl Catalog {
    /// Build a catalog with default options
    pub fn build(contents: &str) -> Self {
        Self::build_with(contents, BuildOptions::default())
    }

    /// Build a catalog with explicit options
    pub fn build_with(contents: &str, options: BuildOptions) -> Self {
        let mut records = Vec::new();
        let mut leading: Vec<String> = Vec::new();

        for line in scan(contents) {
            match line.kind {
                LineKind::Definition(def) => {
                    let description = def.doc.or_else(|| {
                        (options.leading_comments && !leading.is_empty())
                            .then(|| leading.join(" "))
                    });

                    for name in def.names {
                        if !is_catalog_name(&name) {
                            tracing::trace!("Skipping non-target name '{}' on line {}", name, line.number);
                            continue;
                        }
                        records.push(TargetRecord {
                            name,
                            dependencies: def.prerequisites.clone(),
                            description: description.clone(),
                        });
                    }
                    leading.clear();
                }
                LineKind::Comment(text) => {
                    if !text.is_empty() {
                        leading.push(text);
                    }
                }
                LineKind::Recipe | LineKind::Blank | LineKind::Other => leading.clear(),
            }
        }

        Self { records }
    }

    pub fn records(&self) -> &[TargetRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<TargetRecord> {
        self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether any record has this exact name
    pub fn contains(&self, name: &str) -> bool {
        self.records.iter().any(|r| r.name == name)
    }

    /// Distinct names in first-appearance order
    pub fn names(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.records
            .iter()
            .filter(|r| seen.insert(r.name.as_str()))
            .map(|r| r.name.clone())
            .collect()
    }

    /// Names defined more than once, in first-appearance order
    pub fn duplicates(&self) -> Vec<String> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for record in &self.records {
            *counts.entry(record.name.as_str()).or_default() += 1;
        }
        self.names()
            .into_iter()
            .filter(|n| counts.get(n.as_str()).copied().unwrap_or(0) > 1)
            .collect()
    }

    /// Return a new catalog with only the records that pass `filter`
    pub fn filtered(&self, filter: &TargetFilter) -> Catalog {
        Catalog {
            records: self
                .records
                .iter()
                .filter(|r| filter.matches(r))
                .cloned()
                .collect(),
        }
    }
}

/// Names the catalog keeps: valid identifiers that are not special targets
fn is_catalog_name(name: &str) -> bool {
    !name.starts_with('.') && is_valid_target_name(name)
}

/// Filter applied to a catalog for discovery requests
#[derive(Debug, Clone, Default)]
pub struct TargetFilter {
    pattern: Option<GlobMatcher>,
    documented_only: bool,
}

impl TargetFilter {
    /// Create a filter from an optional glob pattern
    ///
    /// Matching is case-sensitive and must cover the whole name. `None`,
    /// an empty string and `*` all match everything.
    ///
    /// # Errors
    /// * `ValidationError::InvalidPattern` - If the glob does not compile
    pub fn new(pattern: Option<&str>, documented_only: bool) -> Result<Self, ValidationError> {
        let pattern = match pattern.map(str::trim) {
            None | Some("") | Some("*") => None,
            Some(p) => Some(
                Glob::new(p)
                    .map_err(|e| ValidationError::InvalidPattern {
                        pattern: p.to_string(),
                        reason: e.kind().to_string(),
                    })?
                    .compile_matcher(),
            ),
        };

        Ok(Self {
            pattern,
            documented_only,
        })
    }

    pub fn matches(&self, record: &TargetRecord) -> bool {
        if self.documented_only && record.description.is_none() {
            return false;
        }
        self.pattern
            .as_ref()
            .map_or(true, |m| m.is_match(record.name.as_str()))
    }
}
