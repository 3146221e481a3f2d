//! Shared utilities for integration tests.

use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use dispatch_server::{ServerBuilder, ServerConfig, Shutdown};

/// A server running on an ephemeral local port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<()>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Configuration suitable for tests.
pub fn config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.bind_address = "127.0.0.1:0".to_string();
    config.shutdown_grace_secs = 1;
    config
}

/// Build the server and start its accept loop.
///
/// The listener is bound before this returns, so requests can be sent
/// immediately.
pub async fn start(builder: ServerBuilder) -> TestServer {
    let server = builder.build();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let handle = tokio::spawn(async move {
        server.run(listener, server_shutdown).await.unwrap();
    });

    TestServer { addr, shutdown, handle }
}

/// HTTP client that reports redirects instead of following them.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}
