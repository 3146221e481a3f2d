//! Accept loop and per-connection request pipeline.
//!
//! # Data Flow
//! ```text
//! run()                          one loop per server
//!   └─ permit ← AdmissionGate    up to N accept-waits in flight
//!        └─ accept_one()         TcpListener::accept
//!             → SessionStore::get_or_create(peer ip)
//!             → permit released
//!             → spawn serve_connection()
//!                  → on_request hook
//!                  → read body, merge params
//!                  → RouteTable::route
//!                  → SessionStore::touch
//!                  → on_error mapping  (panic guarded)
//!                  → response::render  (panic guarded)
//! ```
//!
//! # Design Decisions
//! - The permit covers the accept-wait only; processing is unbounded
//! - One request per connection (keep-alive disabled)
//! - Internal failures and panics are caught per request and answered with
//!   a `ServerError` packet
//! - Shutdown stops new accepts and drains in-flight requests up to the
//!   configured grace period

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::response::IntoResponse;
use futures_util::FutureExt;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use std::any::Any;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::http::packet::{ResponsePacket, ServerError};
use crate::http::request::{parse_params, RequestId, X_REQUEST_ID};
use crate::http::response;
use crate::http::server::{ServeError, ServerState};
use crate::net::{AdmissionGate, AdmissionPermit, ConnectionGuard, ConnectionState};
use crate::observability::metrics;
use crate::routing::DispatchError;
use crate::session::Session;

/// Pause after a failed accept so a persistent error does not spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Failure inside the request pipeline.
#[derive(Debug, Error)]
pub enum RequestFailure {
    #[error("failed to read request body: {0}")]
    Body(#[source] axum::Error),

    #[error(transparent)]
    Route(#[from] DispatchError),
}

/// The accept loop of one server instance.
pub struct Dispatcher {
    state: Arc<ServerState>,
    listener: Arc<TcpListener>,
    gate: AdmissionGate,
    local_addr: SocketAddr,
}

impl Dispatcher {
    pub fn new(state: Arc<ServerState>, listener: TcpListener) -> Result<Self, ServeError> {
        let local_addr = listener.local_addr().map_err(ServeError::LocalAddr)?;
        let gate = AdmissionGate::new(state.config.max_simultaneous_connections);
        Ok(Self {
            state,
            listener: Arc::new(listener),
            gate,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The gate sized by `max_simultaneous_connections`.
    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// Accept and serve connections until `shutdown` fires.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            address = %self.local_addr,
            max_simultaneous_connections = self.gate.capacity(),
            session_expiration_secs = self.state.config.session_expiration_seconds,
            routes = self.state.routes.len(),
            "Dispatcher accepting connections"
        );

        let mut acceptors = JoinSet::new();
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting");
                    break;
                }
                Some(joined) = acceptors.join_next(), if !acceptors.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            tracing::error!(error = %e, "Accept task panicked");
                        }
                    }
                }
                permit = self.gate.acquire() => {
                    let Ok(permit) = permit else { break };
                    acceptors.spawn(accept_one(
                        Arc::clone(&self.state),
                        Arc::clone(&self.listener),
                        permit,
                        self.local_addr,
                    ));
                }
            }
        }

        self.gate.close();
        acceptors.abort_all();
        while acceptors.join_next().await.is_some() {}

        let in_flight = self.state.connections.active_count();
        if in_flight > 0 {
            tracing::info!(in_flight, "Draining in-flight requests");
            if !self.state.connections.wait_idle(self.state.config.shutdown_grace()).await {
                tracing::warn!(
                    remaining = self.state.connections.active_count(),
                    "Shutdown grace period elapsed with requests still running"
                );
            }
        }
    }
}

/// One accept-wait: holds `permit` until a connection arrives and its
/// session is resolved, then serves the connection on a detached task.
async fn accept_one(
    state: Arc<ServerState>,
    listener: Arc<TcpListener>,
    permit: AdmissionPermit,
    local_addr: SocketAddr,
) {
    let (stream, peer) = match listener.accept().await {
        Ok(accepted) => accepted,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to accept connection");
            tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
            return;
        }
    };

    let guard = state.connections.track();
    tracing::debug!(connection_id = %guard.id(), peer_addr = %peer, state = %ConnectionState::Accepted, "Connection accepted");

    let session = state.sessions.get_or_create(peer.ip());
    tracing::trace!(connection_id = %guard.id(), state = %ConnectionState::SessionResolved, "Session resolved");
    permit.release();

    tokio::spawn(serve_connection(state, stream, peer, session, guard, local_addr));
}

async fn serve_connection(
    state: Arc<ServerState>,
    stream: TcpStream,
    peer: SocketAddr,
    session: Arc<Session>,
    guard: ConnectionGuard,
    local_addr: SocketAddr,
) {
    let connection_id = guard.id();
    let service = tower::service_fn(move |request: Request<Incoming>| {
        let state = Arc::clone(&state);
        let session = Arc::clone(&session);
        async move { Ok::<_, Infallible>(handle_request(state, session, peer, local_addr, request).await) }
    });
    let service = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .service(service);

    let conn = http1::Builder::new()
        .keep_alive(false)
        .serve_connection(TokioIo::new(stream), TowerToHyperService::new(service));
    if let Err(err) = conn.await {
        tracing::debug!(connection_id = %connection_id, error = %err, "Connection ended with error");
    }
    tracing::trace!(connection_id = %connection_id, state = %ConnectionState::Responded, "Connection done");
    drop(guard);
}

/// Produce exactly one response for `request`, whatever happens inside.
async fn handle_request(
    state: Arc<ServerState>,
    session: Arc<Session>,
    peer: SocketAddr,
    local_addr: SocketAddr,
    request: Request<Incoming>,
) -> Response<Body> {
    let started = Instant::now();
    let request_id = RequestId::new();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let host = response::host_address(&state.config, request.headers(), local_addr);
    let span = tracing::info_span!("request", request_id = %request_id, client = %peer.ip());

    tracing::info!(parent: &span, method = %method, path = %path, "Inbound request");

    let outcome = AssertUnwindSafe(dispatch(&state, session, request))
        .catch_unwind()
        .instrument(span.clone())
        .await;
    span.in_scope(|| {
        let packet = match outcome {
            Ok(Ok(packet)) => packet,
            Ok(Err(failure)) => {
                tracing::error!(error = %failure, detail = ?failure, "Request failed");
                metrics::record_internal_failure();
                ResponsePacket::error(ServerError::Internal)
            }
            Err(panic) => {
                tracing::error!(panic = %panic_message(panic.as_ref()), "Request handler panicked");
                metrics::record_internal_failure();
                ResponsePacket::error(ServerError::Internal)
            }
        };
        respond(&state, packet, method.as_str(), &host, started, request_id)
    })
}

/// Map, record and render a routed packet.
fn respond(
    state: &ServerState,
    mut packet: ResponsePacket,
    method: &str,
    host: &str,
    started: Instant,
    request_id: RequestId,
) -> Response<Body> {
    apply_error_mapping(state, &mut packet);

    tracing::debug!(outcome = %packet.error, "Request routed");
    metrics::record_request(method, packet.error.as_str(), started);

    let mut response = std::panic::catch_unwind(AssertUnwindSafe(|| response::render(&packet, host)))
        .unwrap_or_else(|panic| {
            tracing::error!(panic = %panic_message(panic.as_ref()), "Response rendering panicked");
            metrics::record_internal_failure();
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        });
    response.headers_mut().insert(X_REQUEST_ID, request_id.header_value());
    response
}

/// Point a failed packet at the `on_error` target, if one is mapped.
///
/// A panicking mapper downgrades the packet to an unmapped `ServerError`.
fn apply_error_mapping(state: &ServerState, packet: &mut ResponsePacket) {
    let kind = packet.error;
    if kind.is_ok() {
        return;
    }

    match std::panic::catch_unwind(AssertUnwindSafe(|| state.hooks.error_path(kind))) {
        Ok(Some(target)) => {
            packet.redirect = target;
            packet.redirect_param = None;
        }
        Ok(None) => tracing::debug!(error = %kind, "No redirect mapped for error"),
        Err(panic) => {
            tracing::error!(error = %kind, panic = %panic_message(panic.as_ref()), "Error mapper panicked");
            metrics::record_internal_failure();
            *packet = ResponsePacket::error(ServerError::Internal);
        }
    }
}

/// Parse, route and record activity for one request.
async fn dispatch(
    state: &ServerState,
    session: Arc<Session>,
    request: Request<Incoming>,
) -> Result<ResponsePacket, RequestFailure> {
    let (parts, body) = request.into_parts();
    state.hooks.notify_request(&session, &parts);

    let body = axum::body::to_bytes(Body::new(body), state.config.max_body_bytes)
        .await
        .map_err(RequestFailure::Body)?;
    let params = parse_params(&parts, &body);
    for (key, value) in params.iter() {
        tracing::debug!(key = %key, value = %value, "Request parameter");
    }
    tracing::trace!(state = %ConnectionState::Parsed, params = params.len(), "Request parsed");

    let packet = state
        .routes
        .route(
            Arc::clone(&session),
            &parts.method,
            parts.uri.path(),
            params,
            state.session_expiration(),
        )
        .await?;
    state.sessions.touch(&session);
    tracing::trace!(state = %ConnectionState::Routed, error = %packet.error, "Request routed");

    Ok(packet)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::http::server::HttpServer;

    #[test]
    fn panic_payloads_are_described() {
        let from_str: Box<dyn Any + Send> = Box::new("boom");
        let from_string: Box<dyn Any + Send> = Box::new(String::from("bang"));
        let other: Box<dyn Any + Send> = Box::new(7u8);

        assert_eq!(panic_message(from_str.as_ref()), "boom");
        assert_eq!(panic_message(from_string.as_ref()), "bang");
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }

    #[test]
    fn error_mapping_sets_redirect_for_failed_packets() {
        let server = HttpServer::builder(ServerConfig::default())
            .on_error(|kind: ServerError| Some(format!("/errors/{}", kind)))
            .build();

        let mut ok = ResponsePacket::text("fine");
        apply_error_mapping(server.state(), &mut ok);
        assert!(!ok.has_redirect());

        let mut missing = ResponsePacket::redirect_with("/ignored", "a=1").with_error(ServerError::PageNotFound);
        apply_error_mapping(server.state(), &mut missing);
        assert_eq!(missing.redirect, "/errors/PageNotFound");
        assert_eq!(missing.redirect_param, None);
    }

    #[test]
    fn panicking_error_mapper_downgrades_to_server_error() {
        let server = HttpServer::builder(ServerConfig::default())
            .on_error(|_: ServerError| -> Option<String> { panic!("mapper bug") })
            .build();

        let mut packet = ResponsePacket::error(ServerError::NotAuthorized);
        apply_error_mapping(server.state(), &mut packet);
        assert_eq!(packet.error, ServerError::Internal);
        assert!(!packet.has_redirect());
    }
}
