//! In-memory gateway used by tests.

use super::{IncomingMessage, MessagingGateway, PollBatch};
use crate::error::GatewayError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text {
        chat_id: i64,
        text: String,
    },
    Photo {
        chat_id: i64,
        path: PathBuf,
    },
    Document {
        chat_id: i64,
        path: PathBuf,
        caption: String,
    },
}

#[derive(Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<Sent>>,
    failing_chats: Mutex<HashSet<i64>>,
    get_me_results: Mutex<VecDeque<Result<String, GatewayError>>>,
    inbox: Mutex<VecDeque<(i64, Option<IncomingMessage>)>>,
    poll_offsets: Mutex<Vec<i64>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every delivery to `chat_id` fail
    pub fn fail_for(&self, chat_id: i64) {
        self.failing_chats.lock().insert(chat_id);
    }

    /// Script the next `get_me` answers; once exhausted it succeeds
    pub fn script_get_me(&self, results: Vec<Result<String, GatewayError>>) {
        self.get_me_results.lock().extend(results);
    }

    pub fn push_message(&self, message: IncomingMessage) {
        self.inbox.lock().push_back((message.update_id, Some(message)));
    }

    /// Queue an update the transport drops, such as one without a sender
    pub fn push_skipped(&self, update_id: i64) {
        self.inbox.lock().push_back((update_id, None));
    }

    /// Offsets passed to every `poll` so far
    pub fn poll_offsets(&self) -> Vec<i64> {
        self.poll_offsets.lock().clone()
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }

    pub fn texts_for(&self, chat_id: i64) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|s| match s {
                Sent::Text { chat_id: id, text } if *id == chat_id => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    fn check(&self, chat_id: i64) -> Result<(), GatewayError> {
        if self.failing_chats.lock().contains(&chat_id) {
            return Err(GatewayError::Api(format!("chat {} blocked the bot", chat_id)));
        }
        Ok(())
    }

    fn check_file(path: &Path) -> Result<(), GatewayError> {
        std::fs::metadata(path)
            .map(|_| ())
            .map_err(|source| GatewayError::Upload {
                path: path.display().to_string(),
                source,
            })
    }
}

#[async_trait]
impl MessagingGateway for RecordingGateway {
    async fn get_me(&self) -> Result<String, GatewayError> {
        self.get_me_results
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok("test bot".to_string()))
    }

    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), GatewayError> {
        self.check(chat_id)?;
        self.sent.lock().push(Sent::Text {
            chat_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_photo(&self, chat_id: i64, path: &Path) -> Result<(), GatewayError> {
        self.check(chat_id)?;
        Self::check_file(path)?;
        self.sent.lock().push(Sent::Photo {
            chat_id,
            path: path.to_path_buf(),
        });
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: i64,
        path: &Path,
        caption: &str,
    ) -> Result<(), GatewayError> {
        self.check(chat_id)?;
        Self::check_file(path)?;
        self.sent.lock().push(Sent::Document {
            chat_id,
            path: path.to_path_buf(),
            caption: caption.to_string(),
        });
        Ok(())
    }

    async fn poll(&self, offset: i64, timeout: Duration) -> Result<PollBatch, GatewayError> {
        self.poll_offsets.lock().push(offset);
        let pending: Vec<(i64, Option<IncomingMessage>)> = {
            let mut inbox = self.inbox.lock();
            inbox.retain(|(update_id, _)| *update_id >= offset);
            inbox.drain(..).collect()
        };
        if pending.is_empty() {
            tokio::time::sleep(timeout.min(Duration::from_millis(20))).await;
        }
        Ok(PollBatch {
            last_update_id: pending.iter().map(|(update_id, _)| *update_id).max(),
            messages: pending.into_iter().filter_map(|(_, message)| message).collect(),
        })
    }
}
