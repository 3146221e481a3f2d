//! Dispatch outcomes.
//!
//! A [`ResponsePacket`] is what routing produces for one request; the
//! response translator turns it into bytes on the wire.

use axum::body::Bytes;
use axum::http::StatusCode;

/// Closed set of dispatch outcome kinds. `Ok` is the only non-error value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ServerError {
    #[default]
    Ok,
    ExpiredSession,
    NotAuthorized,
    FileNotFound,
    PageNotFound,
    /// Unexpected internal failure.
    Internal,
    UnknownType,
}

impl ServerError {
    pub fn is_ok(self) -> bool {
        self == ServerError::Ok
    }

    /// Stable name used in logs, metrics and error pages.
    pub fn as_str(self) -> &'static str {
        match self {
            ServerError::Ok => "OK",
            ServerError::ExpiredSession => "ExpiredSession",
            ServerError::NotAuthorized => "NotAuthorized",
            ServerError::FileNotFound => "FileNotFound",
            ServerError::PageNotFound => "PageNotFound",
            ServerError::Internal => "ServerError",
            ServerError::UnknownType => "UnknownType",
        }
    }

    /// Status used when an error has no redirect target.
    pub fn status_code(self) -> StatusCode {
        match self {
            ServerError::Ok => StatusCode::OK,
            ServerError::ExpiredSession | ServerError::NotAuthorized => StatusCode::UNAUTHORIZED,
            ServerError::FileNotFound | ServerError::PageNotFound => StatusCode::NOT_FOUND,
            ServerError::UnknownType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ServerError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of routing a single request.
///
/// A non-empty `redirect` wins over the payload fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponsePacket {
    pub payload: Bytes,
    pub content_type: String,
    /// Text encoding advertised as the `charset` parameter.
    pub encoding: Option<String>,
    /// Redirect path relative to the host address. Empty means none.
    pub redirect: String,
    /// Single query parameter appended to the redirect target.
    pub redirect_param: Option<String>,
    pub error: ServerError,
}

impl Default for ResponsePacket {
    fn default() -> Self {
        Self {
            payload: Bytes::new(),
            content_type: "text/plain".to_string(),
            encoding: Some("utf-8".to_string()),
            redirect: String::new(),
            redirect_param: None,
            error: ServerError::Ok,
        }
    }
}

impl ResponsePacket {
    /// Binary payload with no text encoding.
    pub fn bytes(payload: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            content_type: content_type.into(),
            encoding: None,
            ..Self::default()
        }
    }

    pub fn text(body: impl Into<String>) -> Self {
        Self {
            payload: Bytes::from(body.into()),
            ..Self::default()
        }
    }

    pub fn html(body: impl Into<String>) -> Self {
        Self {
            payload: Bytes::from(body.into()),
            content_type: "text/html".to_string(),
            ..Self::default()
        }
    }

    pub fn redirect(path: impl Into<String>) -> Self {
        Self {
            redirect: path.into(),
            ..Self::default()
        }
    }

    /// Redirect carrying one query parameter, e.g. `("/login", "next=/admin")`.
    pub fn redirect_with(path: impl Into<String>, param: impl Into<String>) -> Self {
        Self {
            redirect: path.into(),
            redirect_param: Some(param.into()),
            ..Self::default()
        }
    }

    /// Empty packet carrying an outcome kind.
    pub fn error(kind: ServerError) -> Self {
        Self {
            error: kind,
            ..Self::default()
        }
    }

    pub fn with_encoding(mut self, encoding: Option<String>) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_error(mut self, kind: ServerError) -> Self {
        self.error = kind;
        self
    }

    pub fn has_redirect(&self) -> bool {
        !self.redirect.is_empty()
    }

    /// `Content-Type` header value including the charset when known.
    pub fn content_type_header(&self) -> String {
        match &self.encoding {
            Some(encoding) => format!("{}; charset={}", self.content_type, encoding),
            None => self.content_type.clone(),
        }
    }
}
