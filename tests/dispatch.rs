//! End-to-end dispatch behaviour over real connections.

use axum::http::Method;
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};

use dispatch_server::http::{Params, RawRequest};
use dispatch_server::{HandlerError, HandlerResult, HttpServer, ResponsePacket, ServerError, Session, SessionStore};

mod common;

type Recorded = Arc<Mutex<Vec<ServerError>>>;

/// Error mapper that records every kind and redirects to `/errors/<Kind>`.
fn recording_mapper(recorded: &Recorded) -> impl Fn(ServerError) -> Option<String> + Send + Sync + 'static {
    let recorded = Arc::clone(recorded);
    move |kind| {
        recorded.lock().unwrap().push(kind);
        Some(format!("/errors/{}", kind))
    }
}

/// Echo the merged parameters back as a sorted JSON object.
async fn echo(_session: Arc<Session>, params: Params) -> HandlerResult {
    let sorted: BTreeMap<String, String> = params.into_map().into_iter().collect();
    let body = serde_json::to_string(&sorted).map_err(HandlerError::internal)?;
    Ok(ResponsePacket::text(body))
}

#[tokio::test]
async fn status_route_serves_payload() {
    let server = common::start(
        HttpServer::builder(common::config())
            .route(Method::GET, "/status", false, |_, _| async { Ok(ResponsePacket::text("ok")) }),
    )
    .await;

    let res = common::client().get(server.url("/status")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-type"], "text/plain; charset=utf-8");
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), "ok");

    server.shutdown.trigger();
}

#[tokio::test]
async fn expired_session_redirects_to_error_page() {
    let recorded: Recorded = Arc::default();
    let mut config = common::config();
    config.session_expiration_seconds = 0;

    let server = common::start(
        HttpServer::builder(config)
            .route(Method::GET, "/admin", true, |_, _| async { Ok(ResponsePacket::text("secret")) })
            .on_error(recording_mapper(&recorded)),
    )
    .await;

    let res = common::client().get(server.url("/admin")).send().await.unwrap();
    assert_eq!(res.status(), 302);
    assert_eq!(
        res.headers()["location"].to_str().unwrap(),
        format!("http://{}/errors/ExpiredSession", server.addr)
    );
    assert_eq!(*recorded.lock().unwrap(), vec![ServerError::ExpiredSession]);

    server.shutdown.trigger();
}

#[tokio::test]
async fn sign_in_unlocks_authenticated_route() {
    let server = common::start(
        HttpServer::builder(common::config())
            .route(Method::POST, "/login", false, |session: Arc<Session>, params: Params| async move {
                match params.get("user") {
                    Some(user) => {
                        session.sign_in(user);
                        Ok(ResponsePacket::redirect("/admin"))
                    }
                    None => Ok(ResponsePacket::redirect_with("/login", "missing=user")),
                }
            })
            .route(Method::GET, "/admin", true, |session: Arc<Session>, _| async move {
                Ok(ResponsePacket::text(format!("hello {}", session.principal().unwrap_or_default())))
            }),
    )
    .await;
    let client = common::client();

    let res = client.get(server.url("/admin")).send().await.unwrap();
    assert_eq!(res.status(), 401);
    assert_eq!(res.text().await.unwrap(), "401 NotAuthorized");

    let res = client.post(server.url("/login")).send().await.unwrap();
    assert_eq!(res.status(), 302);
    assert!(res.headers()["location"].to_str().unwrap().ends_with("/login?missing=user"));

    let res = client
        .post(server.url("/login"))
        .header("content-type", "application/x-www-form-urlencoded")
        .body("user=alice")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 302);
    assert!(res.headers()["location"].to_str().unwrap().ends_with("/admin"));

    let res = client.get(server.url("/admin")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "hello alice");

    server.shutdown.trigger();
}

#[tokio::test]
async fn body_parameters_override_query_parameters() {
    let server = common::start(HttpServer::builder(common::config()).route(Method::POST, "/echo", false, echo)).await;

    let res = common::client()
        .post(server.url("/echo?x=1"))
        .header("content-type", "application/x-www-form-urlencoded")
        .body("x=2&y=3")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), r#"{"x":"2","y":"3"}"#);

    server.shutdown.trigger();
}

#[tokio::test]
async fn unknown_route_without_mapping_is_404() {
    let server = common::start(HttpServer::builder(common::config())).await;

    let res = common::client().get(server.url("/nowhere")).send().await.unwrap();
    assert_eq!(res.status(), 404);
    assert_eq!(res.text().await.unwrap(), "404 PageNotFound");

    server.shutdown.trigger();
}

#[tokio::test]
async fn internal_failures_become_server_error() {
    let recorded: Recorded = Arc::default();
    let server = common::start(
        HttpServer::builder(common::config())
            .route(Method::GET, "/fail", false, |_, _| async {
                Err(HandlerError::internal("backing store offline"))
            })
            .route(Method::GET, "/panic", false, |_, _| async {
                if true {
                    panic!("handler bug");
                }
                Ok(ResponsePacket::text("unreachable"))
            })
            .route(Method::GET, "/status", false, |_, _| async { Ok(ResponsePacket::text("ok")) })
            .on_error(recording_mapper(&recorded)),
    )
    .await;
    let client = common::client();

    for path in ["/fail", "/panic"] {
        let res = client.get(server.url(path)).send().await.unwrap();
        assert_eq!(res.status(), 302, "{path}");
        assert!(res.headers()["location"].to_str().unwrap().ends_with("/errors/ServerError"));
    }
    assert_eq!(*recorded.lock().unwrap(), vec![ServerError::Internal, ServerError::Internal]);

    let res = client.get(server.url("/status")).send().await.unwrap();
    assert_eq!(res.status(), 200, "server keeps serving after a panic");

    server.shutdown.trigger();
}

#[tokio::test]
async fn unmapped_internal_failure_is_500_without_detail() {
    let server = common::start(HttpServer::builder(common::config()).route(
        Method::GET,
        "/fail",
        false,
        |_, _| async { Err(HandlerError::internal("password=hunter2")) },
    ))
    .await;

    let res = common::client().get(server.url("/fail")).send().await.unwrap();
    assert_eq!(res.status(), 500);
    let body = res.text().await.unwrap();
    assert_eq!(body, "500 ServerError");

    server.shutdown.trigger();
}

#[tokio::test]
async fn handler_redirect_wins_over_payload() {
    let server = common::start(HttpServer::builder(common::config()).route(
        Method::GET,
        "/moved",
        false,
        |_, _| async {
            let mut packet = ResponsePacket::html("<p>old page</p>");
            packet.redirect = "/new".to_string();
            Ok(packet)
        },
    ))
    .await;

    let res = common::client().get(server.url("/moved")).send().await.unwrap();
    assert_eq!(res.status(), 302);
    assert_eq!(
        res.headers()["location"].to_str().unwrap(),
        format!("http://{}/new", server.addr)
    );
    assert_eq!(res.text().await.unwrap(), "");

    server.shutdown.trigger();
}

#[tokio::test]
async fn configured_host_address_prefixes_redirects() {
    let mut config = common::config();
    config.host_address = Some("https://public.example".to_string());
    let server = common::start(
        HttpServer::builder(config)
            .route(Method::GET, "/go", false, |_, _| async { Ok(ResponsePacket::redirect_with("/there", "a=1")) }),
    )
    .await;

    let res = common::client().get(server.url("/go")).send().await.unwrap();
    assert_eq!(res.headers()["location"], "https://public.example/there?a=1");

    server.shutdown.trigger();
}

#[tokio::test]
async fn session_state_persists_across_connections() {
    let sessions = SessionStore::new();
    let seen: Arc<Mutex<Vec<String>>> = Arc::default();
    let hook_seen = Arc::clone(&seen);

    let server = common::start(
        HttpServer::builder(common::config())
            .sessions(sessions.clone())
            .on_request(move |_session: &Session, request: &RawRequest| {
                hook_seen.lock().unwrap().push(request.uri.path().to_string());
            })
            .route(Method::GET, "/visit", false, |session: Arc<Session>, _| async move {
                let visits = session.get("visits").and_then(|v| v.as_u64()).unwrap_or(0) + 1;
                session.insert("visits", visits);
                Ok(ResponsePacket::text(visits.to_string()))
            }),
    )
    .await;
    let client = common::client();

    for expected in ["1", "2", "3"] {
        let res = client.get(server.url("/visit")).send().await.unwrap();
        assert_eq!(res.text().await.unwrap(), expected);
    }

    assert_eq!(sessions.len(), 1);
    let session = sessions.get(&IpAddr::V4(Ipv4Addr::LOCALHOST)).unwrap();
    assert!(session.last_activity() > session.created_at());
    assert_eq!(*seen.lock().unwrap(), vec!["/visit", "/visit", "/visit"]);

    server.shutdown.trigger();
}

#[tokio::test]
async fn panicking_error_mapper_still_answers() {
    let server = common::start(
        HttpServer::builder(common::config())
            .on_error(|_: ServerError| -> Option<String> { panic!("mapper bug") })
            .route(Method::GET, "/status", false, |_, _| async { Ok(ResponsePacket::text("ok")) }),
    )
    .await;
    let client = common::client();

    let res = client.get(server.url("/nowhere")).send().await.unwrap();
    assert_eq!(res.status(), 500);
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), "500 ServerError");

    let res = client.get(server.url("/status")).send().await.unwrap();
    assert_eq!(res.status(), 200);

    server.shutdown.trigger();
}

#[tokio::test]
async fn failed_routing_still_records_activity() {
    let sessions = SessionStore::new();
    let server = common::start(
        HttpServer::builder(common::config())
            .sessions(sessions.clone())
            .route(Method::GET, "/admin", true, |_, _| async { Ok(ResponsePacket::text("secret")) }),
    )
    .await;
    let client = common::client();
    let localhost = IpAddr::V4(Ipv4Addr::LOCALHOST);

    let res = client.get(server.url("/nowhere")).send().await.unwrap();
    assert_eq!(res.status(), 404);
    let session = sessions.get(&localhost).unwrap();
    let after_not_found = session.last_activity();
    assert!(after_not_found > session.created_at());

    let res = client.get(server.url("/admin")).send().await.unwrap();
    assert_eq!(res.status(), 401);
    assert!(session.last_activity() > after_not_found);

    server.shutdown.trigger();
}

#[tokio::test]
async fn expired_session_is_refreshed_by_the_rejected_request() {
    let sessions = SessionStore::new();
    let mut config = common::config();
    config.session_expiration_seconds = 0;
    let server = common::start(
        HttpServer::builder(config)
            .sessions(sessions.clone())
            .route(Method::GET, "/admin", true, |_, _| async { Ok(ResponsePacket::text("secret")) }),
    )
    .await;

    let res = common::client().get(server.url("/admin")).send().await.unwrap();
    assert_eq!(res.status(), 401);
    assert_eq!(res.text().await.unwrap(), "401 ExpiredSession");

    let session = sessions.get(&IpAddr::V4(Ipv4Addr::LOCALHOST)).unwrap();
    assert!(session.last_activity() > session.created_at());

    server.shutdown.trigger();
}

#[tokio::test]
async fn internal_failure_leaves_activity_untouched() {
    let sessions = SessionStore::new();
    let server = common::start(
        HttpServer::builder(common::config())
            .sessions(sessions.clone())
            .route(Method::GET, "/fail", false, |_, _| async {
                Err(HandlerError::internal("backing store offline"))
            }),
    )
    .await;

    let res = common::client().get(server.url("/fail")).send().await.unwrap();
    assert_eq!(res.status(), 500);

    let session = sessions.get(&IpAddr::V4(Ipv4Addr::LOCALHOST)).unwrap();
    assert_eq!(session.last_activity(), session.created_at());

    server.shutdown.trigger();
}
