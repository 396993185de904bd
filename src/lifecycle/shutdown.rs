//! Shutdown coordination.

use tokio_util::sync::CancellationToken;

use crate::transport::CancelSignal;

/// Coordinator for graceful shutdown.
///
/// Hands out request signals that fire when shutdown is triggered.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh request signal cancelled on shutdown.
    pub fn signal(&self) -> CancelSignal {
        CancelSignal::child_of(&self.token)
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolve once shutdown has been triggered.
    pub async fn wait(&self) {
        self.token.cancelled().await;
    }

    /// Trigger shutdown on Ctrl+C.
    pub fn listen_for_ctrl_c(&self) {
        let token = self.token.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown signal received");
                    token.cancel();
                }
                Err(e) => tracing::error!(error = %e, "Failed to install Ctrl+C handler"),
            }
        });
    }
}
