//! Signal handling for graceful shutdown.

use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::watch;

/// Install SIGTERM and SIGINT handlers.
///
/// The returned receiver turns `true` once either signal arrives.
pub fn spawn_shutdown_listener() -> std::io::Result<watch::Receiver<bool>> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, initiating graceful shutdown");
            }
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT, initiating graceful shutdown");
            }
        }
        let _ = shutdown_tx.send(true);
    });

    Ok(shutdown_rx)
}
