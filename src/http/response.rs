//! Response translation.
//!
//! # Responsibilities
//! - Render a [`ResponsePacket`] as an HTTP response
//! - Build redirect targets from the host address
//! - Render a plain error page when an error has no redirect target
//!
//! # Design Decisions
//! - Redirect wins over payload
//! - Every response carries `Connection: close`; one request per connection
//! - Header construction failures degrade to a bare 500, never a panic

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Response, StatusCode};
use axum::response::IntoResponse;
use std::net::SocketAddr;

use crate::config::ServerConfig;
use crate::http::packet::ResponsePacket;

/// Full `Location` value for a redirecting packet.
pub fn redirect_location(host_address: &str, packet: &ResponsePacket) -> String {
    match &packet.redirect_param {
        Some(param) => format!("{}{}?{}", host_address, packet.redirect, param),
        None => format!("{}{}", host_address, packet.redirect),
    }
}

/// Base address for redirects: configured value, else the request's `Host`,
/// else the listener's local address.
pub fn host_address(config: &ServerConfig, headers: &HeaderMap, local_addr: SocketAddr) -> String {
    if let Some(host) = &config.host_address {
        return host.clone();
    }
    headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(|h| format!("http://{}", h))
        .unwrap_or_else(|| format!("http://{}", local_addr))
}

/// Render a packet onto the wire.
pub fn render(packet: &ResponsePacket, host_address: &str) -> Response<Body> {
    let built = if packet.has_redirect() {
        let location = redirect_location(host_address, packet);
        tracing::debug!(location = %location, error = %packet.error, "Redirecting");
        Response::builder()
            .status(StatusCode::FOUND)
            .header(header::LOCATION, location)
            .header(header::CONTENT_LENGTH, 0)
            .header(header::CONNECTION, "close")
            .body(Body::empty())
    } else if packet.error.is_ok() {
        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, packet.content_type_header())
            .header(header::CONTENT_LENGTH, packet.payload.len())
            .header(header::CONNECTION, "close")
            .body(Body::from(packet.payload.clone()))
    } else {
        return render_error_page(packet);
    };

    built.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to build response");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    })
}

/// Error without a redirect target: the kind's status, the packet's own
/// payload if it has one, otherwise a fixed page naming the error.
fn render_error_page(packet: &ResponsePacket) -> Response<Body> {
    let status = packet.error.status_code();
    let (content_type, body) = if packet.payload.is_empty() {
        (
            "text/plain; charset=utf-8".to_string(),
            Body::from(format!("{} {}", status.as_u16(), packet.error)),
        )
    } else {
        (packet.content_type_header(), Body::from(packet.payload.clone()))
    };

    let mut response = (status, body).into_response();
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&content_type) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::packet::ServerError;
    use axum::body::to_bytes;

    async fn body_text(response: Response<Body>) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn success_carries_payload_and_headers() {
        let response = render(&ResponsePacket::text("ok"), "http://localhost");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "2");
        assert_eq!(response.headers()[header::CONNECTION], "close");
        assert_eq!(body_text(response).await, "ok");
    }

    #[tokio::test]
    async fn redirect_takes_precedence_over_payload() {
        let mut packet = ResponsePacket::html("<p>ignored</p>");
        packet.redirect = "/elsewhere".into();

        let response = render(&packet, "http://example.com");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "http://example.com/elsewhere");
        assert!(response.headers().get(header::CONTENT_TYPE).is_none());
        assert_eq!(body_text(response).await, "");
    }

    #[test]
    fn redirect_param_becomes_query() {
        let packet = ResponsePacket::redirect_with("/login", "next=/admin");
        assert_eq!(
            redirect_location("http://h:1", &packet),
            "http://h:1/login?next=/admin"
        );
    }

    #[tokio::test]
    async fn unmapped_error_renders_status_page() {
        let response = render(&ResponsePacket::error(ServerError::PageNotFound), "http://h");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(response).await, "404 PageNotFound");
    }

    #[tokio::test]
    async fn unmapped_error_keeps_packet_payload() {
        let packet = ResponsePacket::html("<h1>Sign in</h1>").with_error(ServerError::NotAuthorized);
        let response = render(&packet, "http://h");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html; charset=utf-8");
        assert_eq!(body_text(response).await, "<h1>Sign in</h1>");
    }

    #[tokio::test]
    async fn invalid_location_degrades_to_500() {
        let packet = ResponsePacket::redirect("/bad\nheader");
        let response = render(&packet, "http://h");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn host_address_fallbacks() {
        let local: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let mut config = ServerConfig::default();
        let mut headers = HeaderMap::new();

        assert_eq!(host_address(&config, &headers, local), "http://127.0.0.1:8080");

        headers.insert(header::HOST, HeaderValue::from_static("site.test:81"));
        assert_eq!(host_address(&config, &headers, local), "http://site.test:81");

        config.host_address = Some("https://public.test".into());
        assert_eq!(host_address(&config, &headers, local), "https://public.test");
    }
}
