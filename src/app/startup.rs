use super::PicamOrchestrator;
use crate::controller::DetectionMode;
use crate::dispatcher::Dispatcher;
use crate::error::{PicamError, Result};
use crate::gateway::broadcast_text;
use crate::pir::PirPoller;
use crate::watcher::ImageWatcher;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

pub const GREETING: &str = "Hello there, I'm back!";

impl PicamOrchestrator {
    /// Block until the gateway accepts the access token.
    ///
    /// Network errors are retried every `retry_interval` until
    /// `startup_timeout` seconds have passed; a non-positive timeout retries
    /// forever. Any other error aborts startup.
    pub async fn wait_for_gateway(&self) -> Result<()> {
        let timeout = self.config.general.startup_timeout;
        let started = Instant::now();

        loop {
            match self.gateway.get_me().await {
                Ok(identity) => {
                    info!("Connected to messaging gateway as {}", identity);
                    return Ok(());
                }
                Err(e) if e.is_network() => {
                    debug!("Gateway not reachable yet: {}", e);
                    if timeout > 0 && started.elapsed().as_secs() >= timeout as u64 {
                        return Err(PicamError::system(format!(
                            "Messaging gateway not reachable after {} seconds",
                            timeout
                        )));
                    }
                    tokio::time::sleep(self.retry_interval).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Connect, greet the operators and launch all workers
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting picambot");
        self.wait_for_gateway().await?;

        broadcast_text(
            self.gateway.as_ref(),
            &self.config.telegram.owner_ids,
            GREETING,
        )
        .await;

        if self.controller.is_armed() {
            info!("Motion-based capturing enabled at startup");
            self.controller.buzz(&self.config.buzzer.seq_arm);
        }

        let token = self.cancellation_token.clone();

        let dispatcher = Dispatcher::new(Arc::clone(&self.controller), Arc::clone(&self.gateway));
        self.spawn_worker("message poller", dispatcher.run(token.clone()))
            .await;

        let watcher = ImageWatcher::new(Arc::clone(&self.controller), Arc::clone(&self.gateway));
        self.spawn_worker("image watcher", watcher.run(token.clone()))
            .await;

        if self.controller.mode() == DetectionMode::Pir {
            let (Some(port), Some(pin)) = (self.port.clone(), self.config.pir.gpio) else {
                return Err(PicamError::component(
                    "pir",
                    "PIR enabled without a GPIO port or pin",
                ));
            };
            let poller = PirPoller::new(Arc::clone(&self.controller), port, pin);
            self.spawn_worker("PIR poller", poller.run(token.clone()))
                .await;
        }

        if let Some(player) = self.buzzer_player.take() {
            let buzzer_token = token.clone();
            self.spawn_worker("buzzer", async move {
                player.run(buzzer_token).await;
                Ok(())
            })
            .await;
        }

        info!("picambot started with {} workers", self.workers.len());
        Ok(())
    }
}
