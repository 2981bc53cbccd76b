//! Bridge runner for lifecycle management.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::{BridgeError, Result};

/// How long workers get to stop after the shutdown flag is raised.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Bridge runner that manages the lifecycle of a bridge's workers.
///
/// Handles:
/// - Spawning and tracking critical workers
/// - Shutdown signalling through a `watch` channel
/// - Waiting for Ctrl+C / SIGTERM
/// - Joining workers within a drain timeout, aborting stragglers
/// - Turning critical worker failures into a non-zero exit
///
/// # Example
///
/// ```ignore
/// let mut runner = BridgeRunner::new("arduino");
/// let shutdown = runner.shutdown_signal();
/// runner.spawn_critical("pipeline", async move {
///     // Worker logic here, stop when `shutdown` flips to true
///     Ok::<(), BridgeError>(())
/// });
/// runner.run().await
/// ```
pub struct BridgeRunner {
    /// Bridge name for logging.
    name: String,
    /// Bridge version.
    version: String,
    shutdown_tx: watch::Sender<bool>,
    fatal_tx: mpsc::UnboundedSender<BridgeError>,
    fatal_rx: mpsc::UnboundedReceiver<BridgeError>,
    /// Spawned tasks.
    tasks: Vec<(String, JoinHandle<()>)>,
}

impl BridgeRunner {
    /// Create a new bridge runner.
    pub fn new(name: impl Into<String>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let (fatal_tx, fatal_rx) = mpsc::unbounded_channel();

        Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            shutdown_tx,
            fatal_tx,
            fatal_rx,
            tasks: Vec::new(),
        }
    }

    /// Report the bridge binary's version instead of the framework's.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Get a receiver that flips to `true` when shutdown starts.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Spawn a worker whose failure stops the bridge.
    ///
    /// An `Err` is logged and makes [`run`](Self::run) return an error.
    pub fn spawn_critical<F, E>(&mut self, name: impl Into<String>, future: F)
    where
        F: Future<Output = std::result::Result<(), E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let name = name.into();
        let worker = name.clone();
        let fatal_tx = self.fatal_tx.clone();

        let handle = tokio::spawn(async move {
            if let Err(e) = future.await {
                tracing::error!(worker = %worker, error = %e, "Worker failed");
                let _ = fatal_tx.send(BridgeError::worker(worker, e.to_string()));
            }
        });
        self.tasks.push((name, handle));
    }

    /// Run the bridge until Ctrl+C or SIGTERM is received.
    ///
    /// This will:
    /// 1. Wait for a signal or a critical worker failure
    /// 2. Raise the shutdown flag
    /// 3. Join workers, aborting any still running after the drain timeout
    pub async fn run(self) -> Result<()> {
        self.run_until(wait_for_signal()).await
    }

    /// Run the bridge until `signal` completes.
    pub async fn run_until<S>(mut self, signal: S) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        tracing::info!(
            bridge = %self.name,
            version = %self.version,
            tasks = self.tasks.len(),
            "Bridge running. Press Ctrl+C to stop."
        );

        let outcome = tokio::select! {
            _ = signal => {
                tracing::info!(bridge = %self.name, "Received an interrupt, stopping...");
                Ok(())
            }
            Some(err) = self.fatal_rx.recv() => {
                tracing::error!(bridge = %self.name, error = %err, "Stopping after worker failure");
                Err(err)
            }
        };

        let _ = self.shutdown_tx.send(true);
        self.drain().await;

        tracing::info!(bridge = %self.name, "Goodbye!");

        outcome
    }

    async fn drain(&mut self) {
        let deadline = Instant::now() + DEFAULT_DRAIN_TIMEOUT;

        for (name, mut handle) in self.tasks.drain(..) {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => tracing::debug!(worker = %name, "Worker stopped"),
                Ok(Err(e)) => tracing::warn!(worker = %name, error = %e, "Worker ended abnormally"),
                Err(_) => {
                    tracing::warn!(worker = %name, "Worker did not stop in time, aborting");
                    handle.abort();
                    let _ = handle.await;
                }
            }
        }
    }
}

/// Resolve when the process receives Ctrl+C or, on Unix, SIGTERM.
pub async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => {
                        if let Err(e) = result {
                            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                            std::future::pending::<()>().await;
                        }
                    }
                    _ = sigterm.recv() => {
                        tracing::debug!("Received SIGTERM");
                    }
                }
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
            }
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}
