use super::{ComponentState, PicamOrchestrator, ShutdownReason};
use crate::error::Result;
use crate::events::PicamEvent;
use crate::gateway::broadcast_text;
use std::time::{Duration, SystemTime};
use tokio::time::timeout;
use tracing::{error, info, warn};

/// Upper bound for the farewell message
const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// How long workers get to wind down after cancellation
const WORKER_STOP_TIMEOUT: Duration = Duration::from_secs(5);

impl PicamOrchestrator {
    /// Notify operators, stop workers and put the devices in a safe state.
    ///
    /// Each cleanup step runs even if an earlier one failed. Always reports
    /// exit code 1; a second call does nothing.
    pub async fn shutdown(&mut self, reason: ShutdownReason) -> Result<i32> {
        if !self.controller.begin_shutdown() {
            info!("Shutdown already in progress");
            return Ok(1);
        }

        info!("Beginning shutdown: {}", reason);
        self.event_bus.publish(PicamEvent::ShutdownRequested {
            timestamp: SystemTime::now(),
            reason: reason.to_string(),
        });

        let notice = reason.notice();
        if timeout(
            NOTIFY_TIMEOUT,
            broadcast_text(
                self.gateway.as_ref(),
                &self.config.telegram.owner_ids,
                &notice,
            ),
        )
        .await
        .is_err()
        {
            warn!("Timed out notifying operators of shutdown");
        }

        // Stops message polling along with every other worker
        self.cancellation_token.cancel();
        self.stop_workers().await;

        self.release_devices();

        info!("Shutdown complete");
        Ok(1)
    }

    async fn stop_workers(&mut self) {
        let workers = std::mem::take(&mut self.workers);
        for worker in workers {
            self.set_component_state(worker.name, ComponentState::Stopping)
                .await;

            let abort = worker.handle.abort_handle();
            let state = match timeout(WORKER_STOP_TIMEOUT, worker.handle).await {
                Ok(Ok(Ok(()))) => ComponentState::Stopped,
                Ok(Ok(Err(e))) => {
                    error!("Worker '{}' stopped with error: {}", worker.name, e);
                    ComponentState::Failed
                }
                Ok(Err(e)) => {
                    error!("Worker '{}' panicked: {}", worker.name, e);
                    ComponentState::Failed
                }
                Err(_) => {
                    warn!("Worker '{}' did not stop in time, aborting", worker.name);
                    abort.abort();
                    ComponentState::Failed
                }
            };
            self.set_component_state(worker.name, state).await;
        }
    }

    fn release_devices(&self) {
        let Some(port) = &self.port else {
            return;
        };

        if let (true, Some(pin)) = (self.config.buzzer.enable, self.config.buzzer.gpio) {
            if let Err(e) = port.write(pin, false) {
                warn!("Failed to switch off buzzer: {}", e);
            }
        }

        if self.controller.led().is_configured() {
            self.controller.led().set(false);
        }

        match port.release() {
            Ok(()) => info!("GPIO released"),
            Err(e) => warn!("Failed to release GPIO: {}", e),
        }
    }
}
