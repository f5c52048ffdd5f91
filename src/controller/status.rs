use super::{Controller, DetectionMode};
use crate::gateway::Reply;
use tracing::error;

impl Controller {
    /// Describe the current mode. Read-only.
    pub async fn status(&self) -> String {
        let report = self
            .last_motion()
            .map(|t| format!("\nLast motion: {}", t.format("%Y-%m-%d %H:%M:%S")))
            .unwrap_or_default();

        if !self.is_armed() {
            return format!("Motion-based capturing not enabled.{}", report);
        }

        if !self.config.general.image_dir.exists() {
            return "Error: Motion-based capturing enabled but image dir not available!"
                .to_string();
        }

        match (&self.supervisor, self.mode) {
            (Some(supervisor), DetectionMode::MotionProcess) => {
                if supervisor.is_running().await {
                    format!(
                        "Motion-based capturing enabled and motion software running.{}",
                        report
                    )
                } else {
                    format!(
                        "Error: Motion-based capturing enabled but motion software not running!{}",
                        report
                    )
                }
            }
            _ => format!("Motion-based capturing enabled.{}", report),
        }
    }

    /// Force-kill the motion software by process name
    pub async fn kill(&self, reply: &Reply) {
        let supervisor = match (&self.supervisor, self.mode) {
            (Some(supervisor), DetectionMode::MotionProcess) => supervisor,
            _ => {
                reply
                    .text("Error: kill command only supported when motion is enabled")
                    .await;
                return;
            }
        };

        let _transition = self.transition.lock().await;
        match supervisor.kill(&self.config.motion.kill_name).await {
            Ok(()) => reply.text("Kill signal has been sent.").await,
            Err(e) => {
                error!("Failed to send kill signal: {}", e);
                reply
                    .text("Error: Failed to send kill signal. See log for details.")
                    .await;
            }
        }
    }

    pub fn led_status(&self) -> String {
        if !self.led.is_configured() {
            return "No capture LED configured.".to_string();
        }
        format!(
            "Capture LED is {}.",
            if self.led.is_on() { "on" } else { "off" }
        )
    }

    pub fn led_toggle(&self) -> String {
        if !self.led.is_configured() {
            return "No capture LED configured.".to_string();
        }
        self.led.toggle();
        self.led_status()
    }

    /// Play the manual test sequence
    pub fn buzzer(&self) -> String {
        if !self.has_buzzer() {
            return "No buzzer configured.".to_string();
        }
        self.buzz(&self.config.buzzer.seq_buzzer);
        "Buzzer sequence queued.".to_string()
    }
}
