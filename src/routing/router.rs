//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store registered routes in registration order
//! - Look up the first route matching a request
//! - Enforce the session/authentication gate
//! - Invoke the handler and classify its result
//!
//! # Design Decisions
//! - Immutable after the server is built (shared without locks)
//! - O(n) scan; first match wins, later duplicates are shadowed
//! - Routing failures are packets, not errors; only internal handler
//!   failures escape as [`DispatchError`]

use axum::http::Method;
use futures_util::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::http::packet::{ResponsePacket, ServerError};
use crate::http::request::Params;
use crate::routing::matcher::RouteMatcher;
use crate::session::Session;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result returned by route handlers.
pub type HandlerResult = Result<ResponsePacket, HandlerError>;

/// Type-erased route handler.
pub type BoxedHandler = Arc<dyn Fn(Arc<Session>, Params) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Failures a handler can report.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The requested resource could not be read.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The resource has a content type the handler cannot serve.
    #[error("unsupported content type: {0}")]
    UnknownType(String),

    /// Anything unexpected. Escapes routing and becomes a generic server error.
    #[error("handler failed: {0}")]
    Internal(#[source] BoxError),
}

impl HandlerError {
    pub fn internal(err: impl Into<BoxError>) -> Self {
        HandlerError::Internal(err.into())
    }
}

/// An unexpected failure raised while executing a route.
#[derive(Debug, Error)]
#[error("route {route} failed: {source}")]
pub struct DispatchError {
    pub route: String,
    #[source]
    pub source: BoxError,
}

/// A registered (verb, path pattern, auth flag, handler) tuple.
#[derive(Clone)]
pub struct Route {
    matcher: RouteMatcher,
    requires_auth: bool,
    handler: BoxedHandler,
}

impl Route {
    pub fn new<F, Fut>(method: Method, pattern: &str, requires_auth: bool, handler: F) -> Self
    where
        F: Fn(Arc<Session>, Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let handler: BoxedHandler = Arc::new(
            move |session: Arc<Session>, params: Params| -> BoxFuture<'static, HandlerResult> {
                Box::pin(handler(session, params))
            },
        );
        Self {
            matcher: RouteMatcher::new(method, pattern),
            requires_auth,
            handler,
        }
    }

    pub fn matcher(&self) -> &RouteMatcher {
        &self.matcher
    }

    pub fn requires_auth(&self) -> bool {
        self.requires_auth
    }

    pub fn matches(&self, method: &Method, path: &str) -> bool {
        self.matcher.matches(method, path)
    }

    fn name(&self) -> String {
        format!("{} {}", self.matcher.method(), self.matcher.pattern())
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("matcher", &self.matcher)
            .field("requires_auth", &self.requires_auth)
            .finish_non_exhaustive()
    }
}

/// Ordered collection of routes.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a route built from its parts.
    pub fn add_route<F, Fut>(&mut self, method: Method, pattern: &str, requires_auth: bool, handler: F)
    where
        F: Fn(Arc<Session>, Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.add(Route::new(method, pattern, requires_auth, handler));
    }

    /// Append a route. No uniqueness check is made.
    pub fn add(&mut self, route: Route) {
        tracing::debug!(route = %route.name(), requires_auth = route.requires_auth, "Route registered");
        self.routes.push(route);
    }

    /// First route matching the verb and path.
    pub fn find(&self, method: &Method, path: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.matches(method, path))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Dispatch a request to the first matching route.
    ///
    /// Every routing outcome is returned as a packet. `Err` is reserved for
    /// internal handler failures.
    pub async fn route(
        &self,
        session: Arc<Session>,
        method: &Method,
        path: &str,
        params: Params,
        session_expiration: Duration,
    ) -> Result<ResponsePacket, DispatchError> {
        let Some(route) = self.find(method, path) else {
            tracing::debug!(method = %method, path = %path, "No route matched");
            return Ok(ResponsePacket::error(ServerError::PageNotFound));
        };

        if route.requires_auth {
            if session.is_expired(session_expiration) {
                tracing::debug!(client = %session.identity(), idle = ?session.idle_for(), "Session expired");
                return Ok(ResponsePacket::error(ServerError::ExpiredSession));
            }
            if !session.is_authenticated() {
                tracing::debug!(client = %session.identity(), route = %route.name(), "Not authorized");
                return Ok(ResponsePacket::error(ServerError::NotAuthorized));
            }
        }

        match (route.handler)(session, params).await {
            Ok(packet) => Ok(packet),
            Err(HandlerError::NotFound(resource)) => {
                tracing::debug!(resource = %resource, "Handler reported missing resource");
                Ok(ResponsePacket::error(ServerError::FileNotFound))
            }
            Err(HandlerError::UnknownType(kind)) => {
                tracing::debug!(content_type = %kind, "Handler reported unknown type");
                Ok(ResponsePacket::error(ServerError::UnknownType))
            }
            Err(HandlerError::Internal(source)) => Err(DispatchError {
                route: route.name(),
                source,
            }),
        }
    }
}
