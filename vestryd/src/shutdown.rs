use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::info;

/// Listen for OS signals and flip the shutdown channel.
///
/// This task runs until SIGTERM or SIGINT is received.
pub async fn signal_listener(shutdown_tx: watch::Sender<bool>) {
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => {
            info!("received SIGTERM, initiating graceful shutdown");
        }
        _ = sigint.recv() => {
            info!("received SIGINT, initiating graceful shutdown");
        }
    }
    let _ = shutdown_tx.send(true);
}
