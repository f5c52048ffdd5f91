use super::{Controller, DetectionMode};
use crate::events::PicamEvent;
use crate::gateway::Reply;
use crate::supervisor::shell;
use std::io;
use std::path::Path;
use std::time::SystemTime;
use tracing::{debug, error, info, warn};

impl Controller {
    /// Take a single shot and send it to the requesting operator.
    ///
    /// A running motion process holds the camera, so it is stopped around the
    /// capture and started again afterwards.
    pub async fn capture(&self, reply: &Reply) {
        let _transition = self.transition.lock().await;

        let suspend_motion = match (&self.supervisor, self.mode) {
            (Some(supervisor), DetectionMode::MotionProcess) => supervisor.is_running().await,
            _ => false,
        };
        let was_armed = self.is_armed();

        if suspend_motion {
            info!("Suspending motion software for manual capture");
            if was_armed {
                self.disarm_locked(reply).await;
            } else {
                self.stop_motion(reply).await;
            }
        }

        self.capture_locked(reply).await;

        if suspend_motion {
            if was_armed {
                self.arm_locked(reply).await;
            } else {
                self.start_motion(reply).await;
            }
        }
    }

    async fn capture_locked(&self, reply: &Reply) {
        let capture_file = &self.config.capture.file;
        let capture_cmd = self.config.capture.cmd.trim();
        if capture_file.as_os_str().is_empty() || capture_cmd.is_empty() {
            reply
                .text("Error: No capture file or command configured.")
                .await;
            return;
        }

        reply.text("Capture in progress, please wait...").await;

        self.set_capture_led(true);
        self.buzz(&self.config.buzzer.seq_capture);

        remove_if_exists(capture_file);
        let result = run_capture_command(capture_cmd).await;
        // the LED goes off whatever the outcome
        self.set_capture_led(false);

        if let Err(e) = result {
            error!("Capture failed: {}", e);
            reply.text("Error: Capture failed. See log for details.").await;
            self.event_bus.publish(PicamEvent::CaptureCompleted {
                success: false,
                manual: true,
            });
            return;
        }

        if !capture_file.exists() {
            reply
                .text(format!(
                    "Error: Capture file not found: \"{}\"",
                    capture_file.display()
                ))
                .await;
            self.event_bus.publish(PicamEvent::CaptureCompleted {
                success: false,
                manual: true,
            });
            return;
        }

        let delivered = reply.photo(capture_file).await;
        if let Err(e) = &delivered {
            error!("Could not send captured image: {}", e);
            reply
                .text("Error: Could not send captured image. See log for details.")
                .await;
        }

        if self.config.general.delete_images {
            remove_if_exists(capture_file);
        }

        self.event_bus.publish(PicamEvent::CaptureCompleted {
            success: delivered.is_ok(),
            manual: true,
        });
    }

    /// Handle one PIR motion reading. Does nothing while disarmed.
    ///
    /// Failures are only logged since there is no operator to answer.
    pub async fn pir_tick(&self) {
        if !self.is_armed() {
            return;
        }

        let _transition = self.transition.lock().await;
        // a disarm may have won the race for the lock
        if !self.is_armed() {
            return;
        }

        self.record_motion();
        self.event_bus.publish(PicamEvent::MotionDetected {
            armed: true,
            timestamp: SystemTime::now(),
        });

        self.buzz(&self.config.buzzer.seq_motion);
        self.set_capture_led(true);

        let result = run_capture_command(&self.config.pir.capture_cmd).await;
        self.set_capture_led(false);

        if let Err(e) = &result {
            error!("Error: PIR capture failed: {}", e);
        }
        self.event_bus.publish(PicamEvent::CaptureCompleted {
            success: result.is_ok(),
            manual: false,
        });
    }

    fn set_capture_led(&self, on: bool) {
        if self.led.is_configured() {
            self.led.set(on);
        }
    }
}

/// Run a capture command to completion. A non-zero exit is logged but not
/// treated as failure; callers check for the produced file instead.
async fn run_capture_command(command: &str) -> io::Result<()> {
    debug!("Running capture command: {}", command);
    let status = shell(command).status().await?;
    if !status.success() {
        warn!("Capture command '{}' exited with {}", command, status);
    }
    Ok(())
}

fn remove_if_exists(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}
