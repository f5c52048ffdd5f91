use super::{PicamOrchestrator, ShutdownReason};
use crate::error::{PicamError, Result};
use crate::events::PicamEvent;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{oneshot, Mutex};
use tracing::info;

impl PicamOrchestrator {
    /// Run until a termination signal arrives or a worker dies, then clean up.
    /// Returns the process exit code.
    pub async fn run(&mut self) -> Result<i32> {
        info!("picambot is running");

        let (shutdown_sender, mut shutdown_receiver) = oneshot::channel();
        self.setup_signal_handlers(shutdown_sender)?;

        let reason = tokio::select! {
            received = &mut shutdown_receiver => received.map_err(|_| PicamError::System {
                message: "Shutdown channel closed unexpectedly".to_string(),
            })?,
            reason = self.supervise() => reason,
        };

        info!("Shutdown initiated: {}", reason);
        self.shutdown(reason).await
    }

    /// Check worker liveness once per supervision interval until one has died
    pub async fn supervise(&mut self) -> ShutdownReason {
        loop {
            tokio::time::sleep(self.supervision_interval).await;
            if let Some((name, cause)) = self.finished_worker().await {
                self.event_bus.publish(PicamEvent::WorkerFailed {
                    worker: name.to_string(),
                    error: cause,
                });
                return ShutdownReason::WorkerDied(name.to_string());
            }
        }
    }

    /// Register handlers for SIGHUP, SIGINT, SIGQUIT and SIGTERM.
    /// Only the first signal is delivered.
    fn setup_signal_handlers(&self, shutdown_sender: oneshot::Sender<ShutdownReason>) -> Result<()> {
        let shutdown_sender = Arc::new(Mutex::new(Some(shutdown_sender)));

        let kinds = [
            (SignalKind::hangup(), libc::SIGHUP),
            (SignalKind::interrupt(), libc::SIGINT),
            (SignalKind::quit(), libc::SIGQUIT),
            (SignalKind::terminate(), libc::SIGTERM),
        ];

        for (kind, signum) in kinds {
            let mut stream = signal(kind)?;
            let sender = Arc::clone(&shutdown_sender);
            tokio::spawn(async move {
                if stream.recv().await.is_some() {
                    info!("Caught signal {}", signum);
                    if let Some(sender) = sender.lock().await.take() {
                        let _ = sender.send(ShutdownReason::Signal(signum));
                    }
                }
            });
        }

        Ok(())
    }
}
