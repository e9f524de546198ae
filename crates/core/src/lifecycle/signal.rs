//! Shutdown (SIGINT/SIGTERM) and reload (SIGHUP) signal handling.

use tokio::sync::watch;

/// Turns OS signals into a shutdown flag and reload callbacks.
pub struct SignalHandler {
    shutdown_tx: watch::Sender<bool>,
}

impl SignalHandler {
    /// The receiver flips to `true` once shutdown is requested.
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        (Self { shutdown_tx }, shutdown_rx)
    }

    /// Wait for signals until shutdown is requested. Each SIGHUP runs `on_reload`.
    pub async fn run<F>(self, on_reload: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        wait_for_shutdown(on_reload).await;
        self.trigger_shutdown();
    }

    pub fn trigger_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

#[cfg(unix)]
async fn wait_for_shutdown<F: Fn()>(on_reload: F) {
    use tokio::signal::unix::{SignalKind, signal};

    let (mut sigterm, mut sighup) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::hangup()),
    ) {
        (Ok(term), Ok(hup)) => (term, hup),
        (term, hup) => {
            if let Err(e) = term.and(hup) {
                tracing::error!("Failed to install signal handlers: {e}, Ctrl+C only");
            }
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT, initiating shutdown...");
                return;
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, initiating shutdown...");
                return;
            }
            _ = sighup.recv() => {
                tracing::info!("Received SIGHUP, reloading configuration...");
                on_reload();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown<F: Fn()>(_on_reload: F) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {e}");
    }
    tracing::info!("Received Ctrl+C, initiating shutdown...");
}
