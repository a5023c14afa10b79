//! Telegram Bot API transport, implemented directly over HTTP long polling.
//!
//! Channel ids are Telegram chat ids; a group or supergroup chat acts as its
//! own server context, and its creator is the designated administrator.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;

use super::transport::{BotIdentity, ChatTransport, IncomingMessage, TransportError};

const API_BASE: &str = "https://api.telegram.org";
const LONG_POLL_SECS: u64 = 30;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(40);

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct TgUser {
    id: i64,
    first_name: String,
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TgChat {
    id: i64,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct TgMessage {
    from: Option<TgUser>,
    chat: TgChat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TgUpdate {
    update_id: i64,
    message: Option<TgMessage>,
}

#[derive(Debug, Deserialize)]
struct TgChatMember {
    user: TgUser,
    status: String,
}

// ============================================================================
// Transport
// ============================================================================

pub struct TelegramTransport {
    client: reqwest::Client,
    base_url: String,
}

impl TelegramTransport {
    pub fn new(client: reqwest::Client, token: &str) -> Self {
        Self {
            client,
            base_url: format!("{API_BASE}/bot{token}"),
        }
    }

    /// Transport with a custom API base, for tests against a mock server.
    pub fn with_base_url(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, TransportError> {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, method))
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Send(e.to_string()))?;

        let parsed: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| TransportError::Send(e.to_string()))?;

        if !parsed.ok {
            let description = parsed
                .description
                .unwrap_or_else(|| "unknown API error".to_string());
            return Err(TransportError::Send(description));
        }
        parsed
            .result
            .ok_or_else(|| TransportError::Send("missing result payload".to_string()))
    }

    fn chat_id_value(channel_id: &str) -> serde_json::Value {
        // Numeric chat ids go over the wire as integers; anything else
        // (e.g. @channelname) stays a string
        match channel_id.parse::<i64>() {
            Ok(id) => serde_json::json!(id),
            Err(_) => serde_json::json!(channel_id),
        }
    }

    /// Long-poll updates forever, forwarding text messages into `tx`.
    /// Transient API failures are logged and retried after a short delay.
    pub async fn run_update_loop(&self, tx: mpsc::Sender<IncomingMessage>) {
        let mut offset: i64 = 0;
        loop {
            let body = serde_json::json!({
                "timeout": LONG_POLL_SECS,
                "offset": offset,
                "allowed_updates": ["message"],
            });
            let updates: Vec<TgUpdate> = match self.call("getUpdates", body).await {
                Ok(updates) => updates,
                Err(e) => {
                    tracing::warn!(error = %e, "getUpdates failed, retrying");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                let Some(message) = update.message else { continue };
                let (Some(from), Some(text)) = (message.from, message.text) else {
                    continue;
                };

                let chat_id = message.chat.id.to_string();
                let server_id = match message.chat.kind.as_str() {
                    "group" | "supergroup" => Some(chat_id.clone()),
                    _ => None,
                };
                let incoming = IncomingMessage {
                    author_id: from.id.to_string(),
                    channel_id: chat_id,
                    server_id,
                    content: text,
                };
                if tx.send(incoming).await.is_err() {
                    // Receiver gone, the process is shutting down
                    return;
                }
            }
        }
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn connect(&self) -> Result<BotIdentity, TransportError> {
        let me: TgUser = self
            .call("getMe", serde_json::json!({}))
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let name = me.username.unwrap_or(me.first_name);
        Ok(BotIdentity {
            id: me.id.to_string(),
            mention: format!("@{name}"),
            name,
        })
    }

    async fn reply(&self, message: &IncomingMessage, text: &str) -> Result<(), TransportError> {
        self.send_to_channel(&message.channel_id, text).await
    }

    async fn send_to_channel(&self, channel_id: &str, text: &str) -> Result<(), TransportError> {
        let body = serde_json::json!({
            "chat_id": Self::chat_id_value(channel_id),
            "text": text,
        });
        let _sent: serde_json::Value = self.call("sendMessage", body).await.map_err(|e| {
            if let TransportError::Send(description) = &e {
                if description.contains("chat not found") {
                    return TransportError::ChannelNotFound(channel_id.to_string());
                }
            }
            e
        })?;
        Ok(())
    }

    async fn server_owner(&self, server_id: &str) -> Result<Option<String>, TransportError> {
        let body = serde_json::json!({ "chat_id": Self::chat_id_value(server_id) });
        let members: Vec<TgChatMember> = self
            .call("getChatAdministrators", body)
            .await
            .map_err(|e| TransportError::Lookup(e.to_string()))?;

        Ok(members
            .into_iter()
            .find(|member| member.status == "creator")
            .map(|member| member.user.id.to_string()))
    }
}
