//! Route matching logic.
//!
//! # Responsibilities
//! - Match the request verb (exact)
//! - Match the request path against an exact or prefix pattern
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - A pattern ending in `/*` matches its prefix and anything below it,
//!   on segment boundaries (`/static/*` matches `/static/a` but not `/staticfoo`)
//! - No regex, to keep matching O(pattern length)

use axum::http::Method;

/// Compiled path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    Exact(String),
    Prefix(String),
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Self {
        match pattern.strip_suffix("/*") {
            Some(prefix) => PathPattern::Prefix(prefix.to_string()),
            None => PathPattern::Exact(pattern.to_string()),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Exact(expected) => path == expected,
            PathPattern::Prefix(prefix) => match path.strip_prefix(prefix.as_str()) {
                Some(rest) => rest.is_empty() || rest.starts_with('/'),
                None => false,
            },
        }
    }
}

impl std::fmt::Display for PathPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathPattern::Exact(path) => f.write_str(path),
            PathPattern::Prefix(prefix) => write!(f, "{}/*", prefix),
        }
    }
}

/// A verb plus a path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatcher {
    method: Method,
    pattern: PathPattern,
}

impl RouteMatcher {
    pub fn new(method: Method, pattern: &str) -> Self {
        Self {
            method,
            pattern: PathPattern::parse(pattern),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn matches(&self, method: &Method, path: &str) -> bool {
        self.method == *method && self.pattern.matches(path)
    }
}
