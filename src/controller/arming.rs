use super::{Controller, DetectionMode};
use crate::events::PicamEvent;
use crate::gateway::Reply;
use crate::supervisor::{StartOutcome, StopOutcome};
use std::time::SystemTime;
use tracing::{error, info};

impl Controller {
    /// Enable motion-based capturing
    pub async fn arm(&self, reply: &Reply) {
        let _transition = self.transition.lock().await;
        self.arm_locked(reply).await;
    }

    /// Disable motion-based capturing
    pub async fn disarm(&self, reply: &Reply) {
        let _transition = self.transition.lock().await;
        self.disarm_locked(reply).await;
    }

    pub(super) async fn arm_locked(&self, reply: &Reply) {
        if self.is_armed() {
            reply
                .text("Motion-based capturing already enabled! Nothing to do.")
                .await;
            return;
        }

        if self.mode == DetectionMode::None {
            reply
                .text("Error: Cannot enable motion-based capturing since neither PIR nor motion is enabled!")
                .await;
            return;
        }

        reply.text("Enabling motion-based capturing...").await;
        self.buzz(&self.config.buzzer.seq_arm);
        self.set_armed(true);
        self.event_bus.publish(PicamEvent::Armed {
            timestamp: SystemTime::now(),
        });

        if self.mode == DetectionMode::MotionProcess {
            self.start_motion(reply).await;
        }
    }

    pub(super) async fn disarm_locked(&self, reply: &Reply) {
        if !self.is_armed() {
            reply
                .text("Motion-based capturing not enabled! Nothing to do.")
                .await;
            return;
        }

        reply.text("Disabling motion-based capturing...").await;
        self.buzz(&self.config.buzzer.seq_disarm);
        self.set_armed(false);
        self.event_bus.publish(PicamEvent::Disarmed {
            timestamp: SystemTime::now(),
        });

        if self.mode == DetectionMode::MotionProcess {
            self.stop_motion(reply).await;
        }
    }

    pub(super) async fn start_motion(&self, reply: &Reply) {
        let Some(supervisor) = &self.supervisor else {
            return;
        };

        match supervisor.start(&self.config.motion.cmd).await {
            Ok(StartOutcome::Started) => reply.text("Motion software now running.").await,
            Ok(StartOutcome::AlreadyRunning) => {
                reply.text("Motion software already running.").await
            }
            Ok(StartOutcome::StillNotRunning) => {
                reply
                    .text("Motion software still not running. Please check status later.")
                    .await
            }
            Err(e) => {
                error!("Failed to start motion software: {}", e);
                reply
                    .text("Error: Failed to start motion software. See log for details.")
                    .await;
            }
        }
    }

    pub(super) async fn stop_motion(&self, reply: &Reply) {
        let Some(supervisor) = &self.supervisor else {
            return;
        };

        match supervisor.stop().await {
            Ok(StopOutcome::NotRunning {
                stale_pid_removed: false,
            }) => {
                reply
                    .text("No PID file found. Assuming motion software not running. If in doubt use \"kill\".")
                    .await
            }
            Ok(StopOutcome::NotRunning {
                stale_pid_removed: true,
            }) => {
                reply
                    .text("PID found but no corresponding proc entry. Removing PID file.")
                    .await
            }
            Ok(StopOutcome::Stopped { forced }) => {
                if forced {
                    reply
                        .text("Could not terminate process. Had to kill it.")
                        .await;
                }
                info!("Motion software stopped");
                reply.text("Motion software has been stopped.").await;
            }
            Ok(StopOutcome::StopFailed) => {
                reply
                    .text("Could not terminate process. Trying to kill it...")
                    .await;
                reply.text("Error: Unable to stop motion software.").await;
            }
            Err(e) => {
                error!("Failed to stop motion software: {}", e);
                reply
                    .text("Error: Failed to stop motion software. See log for details.")
                    .await;
            }
        }
    }
}
