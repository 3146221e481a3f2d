//! OS signal handling.
//!
//! SIGINT (Ctrl+C) and, on Unix, SIGTERM both request a graceful shutdown.

/// Wait until the process is asked to stop.
pub async fn wait_for_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutdown signal received");
    Ok(())
}
