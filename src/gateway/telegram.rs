use super::{truncate_message, IncomingMessage, MessagingGateway, PollBatch};
use crate::config::TelegramConfig;
use crate::error::GatewayError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Telegram Bot API client
#[derive(Clone)]
pub struct TelegramGateway {
    agent: ureq::Agent,
    base_url: String,
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Deserialize)]
struct User {
    id: i64,
    first_name: String,
    username: Option<String>,
}

#[derive(Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Deserialize)]
struct Message {
    from: Option<User>,
    chat: Chat,
    text: Option<String>,
}

#[derive(Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

impl User {
    fn display_name(&self) -> String {
        match &self.username {
            Some(username) => format!("{} (@{})", self.first_name, username),
            None => self.first_name.clone(),
        }
    }
}

impl TelegramGateway {
    pub fn new(config: &TelegramConfig) -> Self {
        // long polls must not hit the transport timeout
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.poll_timeout + 15))
            .build();
        Self {
            agent,
            base_url: format!(
                "{}/bot{}",
                config.api_url.trim_end_matches('/'),
                config.token
            ),
        }
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    async fn call_json<T: DeserializeOwned + Send + 'static>(
        &self,
        method: &'static str,
        payload: serde_json::Value,
    ) -> Result<T, GatewayError> {
        let agent = self.agent.clone();
        let url = self.url(method);
        run_blocking(move || {
            let response = agent.post(&url).send_json(payload).map_err(map_error)?;
            parse_response(response)
        })
        .await
    }

    async fn upload(
        &self,
        method: &'static str,
        field: &'static str,
        chat_id: i64,
        path: &Path,
        caption: Option<String>,
    ) -> Result<(), GatewayError> {
        let agent = self.agent.clone();
        let url = self.url(method);
        let path = path.to_path_buf();
        run_blocking(move || {
            let data = std::fs::read(&path).map_err(|source| GatewayError::Upload {
                path: path.display().to_string(),
                source,
            })?;
            let (boundary, body) =
                build_multipart_body(chat_id, field, &path, &data, caption.as_deref());
            let response = agent
                .post(&url)
                .set(
                    "Content-Type",
                    &format!("multipart/form-data; boundary={}", boundary),
                )
                .send_bytes(&body)
                .map_err(map_error)?;
            parse_response::<serde_json::Value>(response).map(|_| ())
        })
        .await
    }
}

#[async_trait]
impl MessagingGateway for TelegramGateway {
    async fn get_me(&self) -> Result<String, GatewayError> {
        let me: User = self.call_json("getMe", serde_json::json!({})).await?;
        Ok(format!("{} [{}]", me.display_name(), me.id))
    }

    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), GatewayError> {
        let payload = serde_json::json!({
            "chat_id": chat_id,
            "text": truncate_message(text),
        });
        self.call_json::<serde_json::Value>("sendMessage", payload)
            .await
            .map(|_| ())
    }

    async fn send_photo(&self, chat_id: i64, path: &Path) -> Result<(), GatewayError> {
        debug!("Sending photo {} to {}", path.display(), chat_id);
        self.upload("sendPhoto", "photo", chat_id, path, None).await
    }

    async fn send_document(
        &self,
        chat_id: i64,
        path: &Path,
        caption: &str,
    ) -> Result<(), GatewayError> {
        debug!("Sending document {} to {}", path.display(), chat_id);
        self.upload(
            "sendDocument",
            "document",
            chat_id,
            path,
            Some(caption.to_string()),
        )
        .await
    }

    async fn poll(&self, offset: i64, timeout: Duration) -> Result<PollBatch, GatewayError> {
        let payload = serde_json::json!({
            "offset": offset,
            "timeout": timeout.as_secs(),
            "allowed_updates": ["message"],
        });
        let updates: Vec<Update> = self.call_json("getUpdates", payload).await?;
        Ok(into_batch(updates))
    }
}

/// Keep text messages with a known sender. Skipped updates still count
/// towards the next offset.
fn into_batch(updates: Vec<Update>) -> PollBatch {
    let last_update_id = updates.iter().map(|update| update.update_id).max();
    let messages = updates
        .into_iter()
        .filter_map(|update| {
            let message = update.message?;
            let sender = message.from?;
            Some(IncomingMessage {
                update_id: update.update_id,
                sender_id: sender.id,
                sender_name: sender.display_name(),
                chat_id: message.chat.id,
                text: message.text.unwrap_or_default(),
            })
        })
        .collect();

    PollBatch {
        last_update_id,
        messages,
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, GatewayError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, GatewayError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| GatewayError::Api(format!("request task failed: {}", e)))?
}

fn map_error(e: ureq::Error) -> GatewayError {
    match e {
        ureq::Error::Status(code, resp) => {
            let body = resp.into_string().unwrap_or_default();
            match code {
                401 | 404 => GatewayError::Unauthorized(format!("{}: {}", code, body)),
                429 | 500..=599 => GatewayError::Network(format!("{}: {}", code, body)),
                _ => GatewayError::Api(format!("Server returned {}: {}", code, body)),
            }
        }
        ureq::Error::Transport(t) => GatewayError::Network(format!("Request failed: {}", t)),
    }
}

fn parse_response<T: DeserializeOwned>(response: ureq::Response) -> Result<T, GatewayError> {
    let parsed: ApiResponse<T> = response
        .into_json()
        .map_err(|e| GatewayError::Api(format!("Failed to parse response: {}", e)))?;

    if !parsed.ok {
        return Err(GatewayError::Api(
            parsed
                .description
                .unwrap_or_else(|| "request rejected".to_string()),
        ));
    }
    parsed
        .result
        .ok_or_else(|| GatewayError::Api("Response missing 'result' field".to_string()))
}

fn build_multipart_body(
    chat_id: i64,
    field: &str,
    path: &Path,
    data: &[u8],
    caption: Option<&str>,
) -> (String, Vec<u8>) {
    let boundary = format!("----PicambotBoundary{}", Uuid::new_v4().simple());
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "image.jpg".to_string());

    let mut body = Vec::new();

    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"chat_id\"\r\n\r\n");
    body.extend_from_slice(chat_id.to_string().as_bytes());
    body.extend_from_slice(b"\r\n");

    if let Some(caption) = caption {
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"caption\"\r\n\r\n");
        body.extend_from_slice(caption.as_bytes());
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(b"\r\n");

    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

    (boundary, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multipart_body_contains_fields() {
        let (boundary, body) = build_multipart_body(
            42,
            "document",
            Path::new("/tmp/images/cam.jpg"),
            b"JPEGDATA",
            Some("/tmp/images/cam.jpg"),
        );
        let text = String::from_utf8_lossy(&body);

        assert!(text.contains("name=\"chat_id\"\r\n\r\n42\r\n"));
        assert!(text.contains("name=\"caption\""));
        assert!(text.contains("name=\"document\"; filename=\"cam.jpg\""));
        assert!(text.contains("JPEGDATA"));
        assert!(text.ends_with(&format!("--{}--\r\n", boundary)));
    }

    #[test]
    fn test_updates_without_sender_are_skipped() {
        let raw = r#"{"ok":true,"result":[
            {"update_id":1,"message":{"from":{"id":7,"first_name":"Ann","username":"ann"},"chat":{"id":7},"text":"/status"}},
            {"update_id":2,"message":{"chat":{"id":9},"text":"/arm"}},
            {"update_id":3}
        ]}"#;
        let parsed: ApiResponse<Vec<Update>> = serde_json::from_str(raw).unwrap();
        let updates = parsed.result.unwrap();
        assert_eq!(updates.len(), 3);
        assert_eq!(
            updates[0].message.as_ref().unwrap().from.as_ref().unwrap().display_name(),
            "Ann (@ann)"
        );
        assert!(updates[1].message.as_ref().unwrap().from.is_none());
        assert!(updates[2].message.is_none());

        let batch = into_batch(updates);
        assert_eq!(batch.last_update_id, Some(3));
        assert_eq!(batch.messages.len(), 1);
        assert_eq!(batch.messages[0].sender_id, 7);
        assert_eq!(batch.messages[0].text, "/status");

        assert_eq!(into_batch(Vec::new()).last_update_id, None);
    }
}
