//! PIR sensor polling.

use crate::controller::Controller;
use crate::error::Result;
use crate::events::PicamEvent;
use crate::gpio::DigitalPort;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Sensor sampling period
pub const PIR_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct PirPoller {
    controller: Arc<Controller>,
    port: Arc<dyn DigitalPort>,
    pin: u8,
    interval: Duration,
}

impl PirPoller {
    pub fn new(controller: Arc<Controller>, port: Arc<dyn DigitalPort>, pin: u8) -> Self {
        Self {
            controller,
            port,
            pin,
            interval: PIR_POLL_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sample the sensor until cancelled. A read error ends the worker.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        self.port.configure_input(self.pin)?;
        let creepy = self.controller.config().pir.creepy_mode;
        info!("PIR polling started on pin {} (creepy mode: {})", self.pin, creepy);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }

            let armed = self.controller.is_armed();
            if !armed && !creepy {
                continue;
            }

            if !self.port.read(self.pin)? {
                continue;
            }

            if armed {
                self.controller.pir_tick().await;
            } else {
                debug!("PIR motion while disarmed");
                self.controller.record_motion();
                self.controller
                    .event_bus()
                    .publish(PicamEvent::MotionDetected {
                        armed: false,
                        timestamp: SystemTime::now(),
                    });
            }
        }

        debug!("PIR polling stopped");
        Ok(())
    }
}
