//! Tolerant line classifier for makefiles
//!
//! This is not a make parser. It splits the text into logical lines (joining
//! backslash continuations) and tags each one as a rule definition, a recipe
//! line, a comment, a blank line, or something else (assignments,
//! directives, includes, `define` bodies). Nothing is expanded or evaluated.

/// Marker that starts a recipe line
pub const RECIPE_PREFIX: char = '\t';

/// Marker that introduces a documentation comment on a rule line
pub const DOC_MARKER: &str = "##";

/// A rule header: `names: prerequisites ## doc`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    /// Target names left of the colon, as written
    pub names: Vec<String>,
    /// Prerequisites right of the colon, normal then order-only
    pub prerequisites: Vec<String>,
    /// Trailing `##` documentation, if any
    pub doc: Option<String>,
    /// Whether this is a `::` rule
    pub double_colon: bool,
}

/// Classification of one logical line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    Definition(Definition),
    Recipe,
    /// Comment text with the leading `#` characters removed
    Comment(String),
    Blank,
    Other,
}

/// A classified logical line with its 1-based starting line number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedLine {
    pub number: usize,
    pub kind: LineKind,
}

/// Classify every logical line of `text`
///
/// Lines between `define` and `endef` are variable text, not rules, and come
/// back as [`LineKind::Other`].
pub fn scan(text: &str) -> Vec<ScannedLine> {
    let mut depth = 0usize;

    logical_lines(text)
        .into_iter()
        .map(|(number, line)| {
            let kind = match directive(&line) {
                Some("define") => {
                    depth += 1;
                    LineKind::Other
                }
                Some("endef") if depth > 0 => {
                    depth -= 1;
                    LineKind::Other
                }
                _ if depth > 0 => LineKind::Other,
                _ => classify(&line),
            };
            ScannedLine { number, kind }
        })
        .collect()
}

/// `define`/`endef` keyword opening a non-recipe line, past any
/// `export`/`override`/`private` modifiers
fn directive(line: &str) -> Option<&'static str> {
    if line.starts_with(RECIPE_PREFIX) {
        return None;
    }
    let word = line
        .split_whitespace()
        .find(|w| !matches!(*w, "export" | "override" | "private"))?;
    match word {
        "define" => Some("define"),
        "endef" => Some("endef"),
        _ => None,
    }
}

/// Join backslash-continued physical lines
fn logical_lines(text: &str) -> Vec<(usize, String)> {
    let mut out = Vec::new();
    let mut pending: Option<(usize, String)> = None;

    for (idx, raw) in text.lines().enumerate() {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        let (content, continues) = match raw.strip_suffix('\\') {
            Some(stripped) => (stripped, true),
            None => (raw, false),
        };

        let entry = match pending.take() {
            Some((start, mut acc)) => {
                acc.push(' ');
                acc.push_str(content.trim_start());
                (start, acc)
            }
            None => (idx + 1, content.to_string()),
        };

        if continues {
            pending = Some(entry);
        } else {
            out.push(entry);
        }
    }

    if let Some(entry) = pending {
        out.push(entry);
    }

    out
}

/// Classify a single logical line
pub fn classify(line: &str) -> LineKind {
    if line.starts_with(RECIPE_PREFIX) {
        return LineKind::Recipe;
    }

    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineKind::Blank;
    }

    if let Some(comment) = trimmed.strip_prefix('#') {
        return LineKind::Comment(comment.trim_start_matches('#').trim().to_string());
    }

    // Definitions must start at column zero
    if line.starts_with(' ') {
        return LineKind::Other;
    }

    match parse_definition(line) {
        Some(def) => LineKind::Definition(def),
        None => LineKind::Other,
    }
}

fn parse_definition(line: &str) -> Option<Definition> {
    let (body, doc) = split_comment(line);

    let colon = body.find(':')?;
    let head = &body[..colon];

    // `VAR = a:b`, `VAR ?= x:y`, `VAR != cmd`
    if head.contains('=') {
        return None;
    }

    let after = &body[colon + 1..];
    // `VAR := x` and `VAR ::= x`
    if after.starts_with('=') || after.starts_with(":=") {
        return None;
    }

    let (double_colon, rest) = match after.strip_prefix(':') {
        Some(rest) => (true, rest),
        None => (false, after),
    };

    let names: Vec<String> = head.split_whitespace().map(str::to_string).collect();
    if names.is_empty() {
        return None;
    }

    // Inline recipe: `target: deps ; command`
    let rest = rest.split(';').next().unwrap_or_default();

    // Target-specific variable: `target: VAR = value`
    if rest.contains('=') {
        return None;
    }

    // Static pattern rule: `objs: %.o: %.c` lists prerequisites after the second colon
    let rest = rest.rsplit(':').next().unwrap_or_default();

    let prerequisites = rest
        .split_whitespace()
        .filter(|token| *token != "|")
        .map(str::to_string)
        .collect();

    Some(Definition {
        names,
        prerequisites,
        doc,
        double_colon,
    })
}

/// Split a rule line at its first `#`, returning the body and any `##` doc
fn split_comment(line: &str) -> (&str, Option<String>) {
    match line.find('#') {
        Some(idx) => {
            let comment = &line[idx..];
            let doc = comment
                .strip_prefix(DOC_MARKER)
                .map(|d| d.trim_start_matches('#').trim())
                .filter(|d| !d.is_empty())
                .map(str::to_string);
            (&line[..idx], doc)
        }
        None => (line, None),
    }
}
