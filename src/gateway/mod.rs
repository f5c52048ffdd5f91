//! Chat transport boundary.
//!
//! The controller only needs text and photo delivery, inbound messages with
//! the sender identity, and a one-time identity check at startup. Access
//! control never relies on the transport: senders are compared against the
//! configured owner list by the dispatcher.

mod telegram;

#[cfg(test)]
pub(crate) mod recording;

pub use telegram::TelegramGateway;

use crate::error::GatewayError;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

/// Longest text delivered in one message
pub const MAX_MESSAGE_LENGTH: usize = 4000;

/// An inbound text message
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub update_id: i64,
    pub sender_id: i64,
    pub sender_name: String,
    pub chat_id: i64,
    pub text: String,
}

/// The answer to one poll
#[derive(Debug, Default)]
pub struct PollBatch {
    /// Highest update id received, counting updates that carried no usable message
    pub last_update_id: Option<i64>,
    pub messages: Vec<IncomingMessage>,
}

#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Verify the access token; returns a description of the bot identity
    async fn get_me(&self) -> Result<String, GatewayError>;

    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), GatewayError>;

    async fn send_photo(&self, chat_id: i64, path: &Path) -> Result<(), GatewayError>;

    async fn send_document(
        &self,
        chat_id: i64,
        path: &Path,
        caption: &str,
    ) -> Result<(), GatewayError>;

    /// Wait up to `timeout` for updates with an id of at least `offset`
    async fn poll(&self, offset: i64, timeout: Duration) -> Result<PollBatch, GatewayError>;
}

/// Keep the tail of `text` so it fits into one message
pub fn truncate_message(text: &str) -> &str {
    let count = text.chars().count();
    if count <= MAX_MESSAGE_LENGTH {
        return text;
    }
    let skip = count - MAX_MESSAGE_LENGTH;
    match text.char_indices().nth(skip) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

/// Where the answers to one command go
#[derive(Clone)]
pub struct Reply {
    gateway: Arc<dyn MessagingGateway>,
    chat_id: i64,
}

impl Reply {
    pub fn new(gateway: Arc<dyn MessagingGateway>, chat_id: i64) -> Self {
        Self { gateway, chat_id }
    }

    /// Send a text reply; failures are logged
    pub async fn text<S: AsRef<str>>(&self, text: S) {
        if let Err(e) = self.gateway.send_text(self.chat_id, text.as_ref()).await {
            error!("Failed to reply to {}: {}", self.chat_id, e);
        }
    }

    /// Send a photo reply
    pub async fn photo(&self, path: &Path) -> Result<(), GatewayError> {
        self.gateway.send_photo(self.chat_id, path).await
    }
}

/// Best-effort text delivery to every operator
pub async fn broadcast_text(gateway: &dyn MessagingGateway, owners: &[i64], text: &str) {
    for owner in owners {
        if let Err(e) = gateway.send_text(*owner, text).await {
            warn!("Could not send message to user {}: {}", owner, e);
        }
    }
}
