//! Resource URIs exposed by the MCP server
//!
//! Two read-only resources live under the `make://` scheme:
//! - `make://localhost/current/makefile` - The makefile text
//! - `make://localhost/targets` - The catalog as JSON

use std::borrow::Cow;

use thiserror::Error;
use url::Url;

pub const SCHEME: &str = "make";

pub const MAKEFILE_URI: &str = "make://localhost/current/makefile";
pub const TARGETS_URI: &str = "make://localhost/targets";

/// Resource a URI points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Makefile,
    Targets,
}

/// Why a URI could not be resolved
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UriError {
    #[error("Unsupported URI scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Unknown resource path: {0}")]
    UnknownPath(String),
}

/// Map a resource URI to the resource it names
///
/// The authority, query and fragment are ignored; only the path selects the
/// resource.
pub fn resolve(uri: &str) -> Result<ResourceKind, UriError> {
    let url = Url::parse(uri).map_err(|e| {
        tracing::debug!("Unparseable resource URI {:?}: {}", uri, e);
        UriError::UnsupportedScheme(uri.to_string())
    })?;

    // Url lowercases the scheme
    if url.scheme() != SCHEME {
        return Err(UriError::UnsupportedScheme(url.scheme().to_string()));
    }

    let path = normalize_path(url.path());
    match path.as_str() {
        "current/makefile" => Ok(ResourceKind::Makefile),
        "targets" => Ok(ResourceKind::Targets),
        _ => Err(UriError::UnknownPath(path)),
    }
}

/// Decode `%XX` escapes, trim slashes and case-fold
pub fn normalize_path(path: &str) -> String {
    let decoded = urlencoding::decode(path).unwrap_or(Cow::Borrowed(path));
    decoded.trim_matches('/').to_lowercase()
}
