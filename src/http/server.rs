//! HTTP server setup.
//!
//! # Responsibilities
//! - Collect configuration, routes and hooks at startup
//! - Freeze them into one shared [`ServerState`]
//! - Bind the listener and hand it to the dispatcher

use axum::http::Method;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::config::ServerConfig;
use crate::http::dispatcher::Dispatcher;
use crate::http::packet::ServerError;
use crate::http::request::{Params, RawRequest};
use crate::net::ConnectionTracker;
use crate::routing::{HandlerResult, Route, RouteTable};
use crate::session::{Session, SessionStore};

/// Side-effecting hook run for every request after session resolution.
pub type OnRequest = Arc<dyn Fn(&Session, &RawRequest) + Send + Sync>;

/// Maps a failed outcome to a redirect path.
pub type OnError = Arc<dyn Fn(ServerError) -> Option<String> + Send + Sync>;

/// Error type for server startup.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read local address: {0}")]
    LocalAddr(#[source] std::io::Error),
}

/// Optional per-request customisation.
#[derive(Clone, Default)]
pub struct Hooks {
    pub on_request: Option<OnRequest>,
    pub on_error: Option<OnError>,
}

impl Hooks {
    /// Run `on_request`; absent hook is a no-op.
    pub fn notify_request(&self, session: &Session, request: &RawRequest) {
        if let Some(hook) = &self.on_request {
            hook(session, request);
        }
    }

    /// Redirect path for a failed outcome, if one is mapped.
    pub fn error_path(&self, error: ServerError) -> Option<String> {
        self.on_error
            .as_ref()
            .and_then(|map| map(error))
            .filter(|path| !path.is_empty())
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("on_request", &self.on_request.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Everything one server instance shares with its tasks.
#[derive(Debug)]
pub struct ServerState {
    pub config: ServerConfig,
    pub sessions: SessionStore,
    pub routes: RouteTable,
    pub hooks: Hooks,
    pub connections: ConnectionTracker,
}

impl ServerState {
    pub fn session_expiration(&self) -> Duration {
        self.config.session_expiration()
    }
}

/// Startup-time builder. Routes can only be added here.
pub struct ServerBuilder {
    config: ServerConfig,
    routes: RouteTable,
    hooks: Hooks,
    sessions: SessionStore,
}

impl ServerBuilder {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            routes: RouteTable::new(),
            hooks: Hooks::default(),
            sessions: SessionStore::new(),
        }
    }

    /// Register a route. Earlier registrations take precedence.
    pub fn route<F, Fut>(mut self, method: Method, pattern: &str, requires_auth: bool, handler: F) -> Self
    where
        F: Fn(Arc<Session>, Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.routes.add_route(method, pattern, requires_auth, handler);
        self
    }

    pub fn add(mut self, route: Route) -> Self {
        self.routes.add(route);
        self
    }

    pub fn on_request(mut self, hook: impl Fn(&Session, &RawRequest) + Send + Sync + 'static) -> Self {
        self.hooks.on_request = Some(Arc::new(hook));
        self
    }

    pub fn on_error(mut self, map: impl Fn(ServerError) -> Option<String> + Send + Sync + 'static) -> Self {
        self.hooks.on_error = Some(Arc::new(map));
        self
    }

    /// Use an existing session table instead of a fresh one.
    pub fn sessions(mut self, sessions: SessionStore) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn build(self) -> HttpServer {
        HttpServer {
            state: Arc::new(ServerState {
                config: self.config,
                sessions: self.sessions,
                routes: self.routes,
                hooks: self.hooks,
                connections: ConnectionTracker::new(),
            }),
        }
    }
}

/// HTTP server for one configured site.
pub struct HttpServer {
    state: Arc<ServerState>,
}

impl HttpServer {
    pub fn builder(config: ServerConfig) -> ServerBuilder {
        ServerBuilder::new(config)
    }

    pub fn state(&self) -> &Arc<ServerState> {
        &self.state
    }

    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.state.sessions
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<TcpListener, ServeError> {
        let address = self.state.config.bind_address.clone();
        TcpListener::bind(&address)
            .await
            .map_err(|source| ServeError::Bind { address, source })
    }

    /// Run the dispatcher on `listener` until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: broadcast::Receiver<()>) -> Result<(), ServeError> {
        let dispatcher = Dispatcher::new(self.state, listener)?;
        dispatcher.run(shutdown).await;
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
