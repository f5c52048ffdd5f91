//! Inbound chat commands.
//!
//! Every message is checked against the operator allow-list before anything
//! else happens. Commands are handled one at a time in arrival order.

use crate::controller::Controller;
use crate::error::Result;
use crate::gateway::{IncomingMessage, MessagingGateway, Reply};
use crate::logs;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Pause after a failed poll before asking again
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

pub const REFUSAL_TEXT: &str = "I'm sorry, Dave. I'm afraid I can't do that.";

pub const HELP_TEXT: &str = "/arm - Enable motion-based capturing.
/disarm - Disable motion-based capturing.
/capture - Take a single shot.
/status - Show current mode.
/kill - Kill motion software, if enabled.
/ledtoggle - Toggle capture LED, if configured.
/ledstatus - Show state of capture LED (on/off), if configured.
/buzzer - Trigger buzzer, if configured.
/log - Show recent log messages.
/help - Show this help.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Arm,
    Disarm,
    Kill,
    Status,
    Capture,
    LedToggle,
    LedStatus,
    Buzzer,
    Log,
    Help,
    Unknown(String),
}

impl Command {
    /// Parse trimmed, case-folded message text
    pub fn parse(text: &str) -> Self {
        let normalized = text.trim().to_lowercase();
        match normalized.as_str() {
            "/start" => Command::Start,
            "/arm" => Command::Arm,
            "/disarm" => Command::Disarm,
            "/kill" => Command::Kill,
            "/status" => Command::Status,
            "/capture" => Command::Capture,
            "/ledtoggle" => Command::LedToggle,
            "/ledstatus" => Command::LedStatus,
            "/buzzer" => Command::Buzzer,
            "/log" => Command::Log,
            "/help" => Command::Help,
            _ => Command::Unknown(normalized),
        }
    }
}

pub struct Dispatcher {
    controller: Arc<Controller>,
    gateway: Arc<dyn MessagingGateway>,
}

impl Dispatcher {
    pub fn new(controller: Arc<Controller>, gateway: Arc<dyn MessagingGateway>) -> Self {
        Self {
            controller,
            gateway,
        }
    }

    pub fn is_authorized(&self, sender_id: i64) -> bool {
        self.controller
            .config()
            .telegram
            .owner_ids
            .contains(&sender_id)
    }

    /// Authorize and execute one inbound message
    pub async fn handle(&self, message: &IncomingMessage) {
        let reply = Reply::new(Arc::clone(&self.gateway), message.chat_id);

        if !self.is_authorized(message.sender_id) {
            warn!(
                "Received message from unknown user \"{}\" ({}): \"{}\"",
                message.sender_name, message.sender_id, message.text
            );
            reply.text(REFUSAL_TEXT).await;
            return;
        }

        info!(
            "Received message from {} ({}): \"{}\"",
            message.sender_name, message.sender_id, message.text
        );
        self.execute(Command::parse(&message.text), &reply).await;
    }

    async fn execute(&self, command: Command, reply: &Reply) {
        match command {
            Command::Start | Command::Help => reply.text(HELP_TEXT).await,
            Command::Arm => self.controller.arm(reply).await,
            Command::Disarm => self.controller.disarm(reply).await,
            Command::Kill => self.controller.kill(reply).await,
            Command::Status => reply.text(self.controller.status().await).await,
            Command::Capture => self.controller.capture(reply).await,
            Command::LedToggle => reply.text(self.controller.led_toggle()).await,
            Command::LedStatus => reply.text(self.controller.led_status()).await,
            Command::Buzzer => reply.text(self.controller.buzzer()).await,
            Command::Log => {
                let log_dir = &self.controller.config().general.log_dir;
                match logs::recent_lines(log_dir, logs::RECENT_LINES) {
                    Ok(text) if text.trim().is_empty() => reply.text("Log is empty.").await,
                    Ok(text) => reply.text(text).await,
                    Err(e) => {
                        error!("Failed to read log file: {}", e);
                        reply
                            .text("Error: Failed to read log file. See log for details.")
                            .await;
                    }
                }
            }
            Command::Unknown(text) => {
                warn!("Unknown command: \"{}\"", text);
                reply.text("Unknown command.").await;
            }
        }
    }

    /// Long-poll the gateway and dispatch messages until cancelled
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let timeout = Duration::from_secs(self.controller.config().telegram.poll_timeout);
        let mut offset = 0i64;
        info!("Message polling started");

        loop {
            let polled = tokio::select! {
                _ = cancel.cancelled() => break,
                polled = self.gateway.poll(offset, timeout) => polled,
            };

            match polled {
                Ok(batch) => {
                    if let Some(last) = batch.last_update_id {
                        offset = offset.max(last + 1);
                    }
                    for message in batch.messages {
                        if cancel.is_cancelled() {
                            break;
                        }
                        self.handle(&message).await;
                    }
                }
                Err(e) => {
                    warn!("Polling for messages failed: {}", e);
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(POLL_RETRY_DELAY) => {}
                    }
                }
            }
        }

        debug!("Message polling stopped");
        Ok(())
    }
}
