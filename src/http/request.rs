//! Request parsing.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4)
//! - Parse query string and form body into one parameter map
//!
//! # Design Decisions
//! - Body values overwrite query values sharing a key
//! - Empty or malformed input yields fewer parameters, never an error
//! - Bodies declared as something other than a form are not parsed

use axum::http::{header, request::Parts, HeaderValue};
use std::collections::HashMap;
use url::form_urlencoded;
use uuid::Uuid;

/// Header carrying the request ID on responses.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Request head handed to the `on_request` hook.
pub type RawRequest = Parts;

/// Unique identifier for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn header_value(&self) -> HeaderValue {
        // Hyphenated UUIDs are always valid header values.
        HeaderValue::from_str(&self.0.to_string()).unwrap_or_else(|_| HeaderValue::from_static("unknown"))
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Parameters of one request plus the path it was made to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    path: String,
    values: HashMap<String, String>,
}

impl Params {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            values: HashMap::new(),
        }
    }

    /// Request path (without query string).
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.values.insert(key.into(), value.into())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Add every `key=value` pair of an `&`-separated, form-encoded input.
    /// Later pairs overwrite earlier ones.
    pub fn extend_encoded(&mut self, input: &[u8]) {
        for (key, value) in form_urlencoded::parse(input) {
            self.values.insert(key.into_owned(), value.into_owned());
        }
    }

    pub fn into_map(self) -> HashMap<String, String> {
        self.values
    }
}

/// Merge query-string and body parameters; the body wins on collisions.
pub fn merge_params(path: &str, query: Option<&str>, body: &[u8]) -> Params {
    let mut params = Params::new(path);
    if let Some(query) = query {
        params.extend_encoded(query.as_bytes());
    }
    params.extend_encoded(body);
    params
}

/// Parse the parameters of a request whose body has been read.
pub fn parse_params(parts: &Parts, body: &[u8]) -> Params {
    let body = if body_is_form(parts) { body } else { &[] };
    merge_params(parts.uri.path(), parts.uri.query(), body)
}

fn body_is_form(parts: &Parts) -> bool {
    match parts.headers.get(header::CONTENT_TYPE) {
        None => true,
        Some(value) => value
            .to_str()
            .map(|ct| ct.trim_start().starts_with("application/x-www-form-urlencoded"))
            .unwrap_or(false),
    }
}
