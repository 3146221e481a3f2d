//! Session-aware HTTP dispatch server.
//!
//! Serves the configured website root, with `/status` as a liveness probe.
//! Errors redirect to `<root>/errors/<Kind>.html` when such a page exists.

use axum::http::Method;
use clap::Parser;
use std::path::PathBuf;

use dispatch_server::config::{load_config, ServerConfig};
use dispatch_server::lifecycle::{wait_for_signal, Shutdown};
use dispatch_server::observability::{logging, metrics};
use dispatch_server::routing::static_files;
use dispatch_server::{HttpServer, ResponsePacket, ServerError};

#[derive(Parser)]
#[command(name = "dispatch-server", version, about = "Session-aware HTTP dispatch server")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind address (e.g., 127.0.0.1:8080)
    #[arg(short, long)]
    bind: Option<String>,

    /// Override the website root directory
    #[arg(short, long)]
    root: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.bind_address = bind;
    }
    if let Some(root) = cli.root {
        config.website_root_path = root;
    }

    logging::init(&config.observability.log_level);
    tracing::info!("dispatch-server v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.bind_address,
        max_simultaneous_connections = config.max_simultaneous_connections,
        session_expiration_seconds = config.session_expiration_seconds,
        website_root = %config.website_root_path.display(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let root = config.website_root_path.clone();
    let error_pages = root.join("errors");
    let server = HttpServer::builder(config)
        .route(Method::GET, "/status", false, |_, _| async { Ok(ResponsePacket::text("ok")) })
        .route(Method::GET, "/*", false, static_files(root))
        .on_error(move |kind: ServerError| {
            let page = format!("{}.html", kind);
            error_pages
                .join(&page)
                .is_file()
                .then(|| format!("/errors/{}", page))
        })
        .build();

    let listener = server.bind().await?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(()) => signal_shutdown.trigger(),
            Err(e) => tracing::error!(error = %e, "Failed to install signal handlers"),
        }
    });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
