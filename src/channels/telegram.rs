//! Telegram channel adapter
//!
//! Long-polls the Bot API (`getUpdates`) for text messages and replies with
//! `sendMessage`. Only users listed in `allowed_users` are served when the
//! list is non-empty; everyone else is ignored.

use super::adapter::{AdapterBase, AdapterStatus, ChannelAdapter, ChannelEvent};
use super::message::{split_message, InboundMessage, OutboundMessage};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

const CHANNEL: &str = "telegram";
const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Telegram's hard limit on message length
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Pause after a failed `getUpdates` call
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Telegram adapter settings
#[derive(Debug, Clone)]
pub struct TelegramSettings {
    pub bot_token: String,
    /// Allowed user IDs (empty = everyone)
    pub allowed_users: Vec<i64>,
    pub poll_timeout_secs: u64,
}

/// Telegram channel adapter
pub struct TelegramAdapter {
    settings: TelegramSettings,
    base: Arc<AdapterBase>,
    http: reqwest::Client,
    api_base: String,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<TgMessage>,
}

#[derive(Debug, Deserialize)]
struct TgMessage {
    message_id: i64,
    #[serde(default)]
    from: Option<TgUser>,
    chat: TgChat,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Me {
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Sent {
    message_id: i64,
}

#[derive(Debug, Deserialize)]
struct TgUser {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TgChat {
    id: i64,
}

impl TelegramAdapter {
    /// Create a new Telegram adapter
    pub fn new(settings: TelegramSettings) -> Result<Self> {
        Self::with_api_base(settings, DEFAULT_API_BASE)
    }

    /// Adapter talking to a Bot API server other than api.telegram.org
    pub fn with_api_base(settings: TelegramSettings, api_base: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            settings,
            base: Arc::new(AdapterBase::new(CHANNEL)),
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            poll_task: Mutex::new(None),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.settings.bot_token, method)
    }

    /// Check if a user is allowed
    fn is_user_allowed(&self, user_id: i64) -> bool {
        is_user_allowed(&self.settings.allowed_users, user_id)
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        let resp = self
            .http
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await?;
        let api: ApiResponse<T> = resp.json().await?;
        unwrap_response(method, api)
    }
}

fn is_user_allowed(allowed: &[i64], user_id: i64) -> bool {
    allowed.is_empty() || allowed.contains(&user_id)
}

fn unwrap_response<T>(method: &str, api: ApiResponse<T>) -> Result<T> {
    if !api.ok {
        return Err(Error::Channel(format!(
            "Telegram {} failed: {}",
            method,
            api.description.unwrap_or_else(|| "unknown error".to_string())
        )));
    }
    api.result
        .ok_or_else(|| Error::Channel(format!("Telegram {} returned no result", method)))
}

/// Convert an update into an inbound message, if it is a text message from
/// an allowed user.
fn to_inbound(update: Update, allowed: &[i64]) -> Option<InboundMessage> {
    let message = update.message?;
    let text = message.text?;
    let sender = message.from?.id;

    if !is_user_allowed(allowed, sender) {
        tracing::warn!(user_id = sender, "Ignoring message from unauthorized Telegram user");
        return None;
    }

    Some(
        InboundMessage::new(
            CHANNEL,
            sender.to_string(),
            message.chat.id.to_string(),
            text,
        )
        .with_channel_message_id(message.message_id.to_string()),
    )
}

/// Long-poll loop. Runs until the task is aborted or the receiver is gone.
async fn poll_updates(
    http: reqwest::Client,
    url: String,
    timeout_secs: u64,
    allowed: Vec<i64>,
    event_tx: mpsc::Sender<ChannelEvent>,
) {
    let mut offset: i64 = 0;

    loop {
        let request = http
            .get(&url)
            .query(&[("offset", offset), ("timeout", timeout_secs as i64)])
            .timeout(Duration::from_secs(timeout_secs + 10))
            .send()
            .await;

        let updates = match request {
            Ok(resp) => match resp.json::<ApiResponse<Vec<Update>>>().await {
                Ok(api) => unwrap_response("getUpdates", api),
                Err(e) => Err(Error::from(e)),
            },
            Err(e) => Err(Error::from(e)),
        };

        let updates = match updates {
            Ok(updates) => updates,
            Err(e) => {
                tracing::warn!("Telegram polling failed: {}", e);
                let _ = event_tx
                    .send(ChannelEvent::Error {
                        channel: CHANNEL.to_string(),
                        error: e.to_string(),
                    })
                    .await;
                tokio::time::sleep(POLL_RETRY_DELAY).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            if let Some(message) = to_inbound(update, &allowed) {
                if event_tx.send(ChannelEvent::Message(message)).await.is_err() {
                    tracing::debug!("Event receiver dropped, stopping Telegram polling");
                    return;
                }
            }
        }
    }
}

#[async_trait]
impl ChannelAdapter for TelegramAdapter {
    fn name(&self) -> &str {
        self.base.name()
    }

    async fn start(&self, event_tx: mpsc::Sender<ChannelEvent>) -> Result<()> {
        self.base.set_status(AdapterStatus::Starting);

        let me: Me = match self.call("getMe", serde_json::json!({})).await {
            Ok(me) => me,
            Err(e) => {
                self.base.set_status(AdapterStatus::Stopped);
                return Err(e);
            }
        };
        tracing::info!(bot = ?me.username, "Telegram adapter starting");

        let task = tokio::spawn(poll_updates(
            self.http.clone(),
            self.method_url("getUpdates"),
            self.settings.poll_timeout_secs,
            self.settings.allowed_users.clone(),
            event_tx.clone(),
        ));
        *self.poll_task.lock().await = Some(task);

        let _ = event_tx
            .send(ChannelEvent::Connected {
                channel: CHANNEL.to_string(),
            })
            .await;

        self.base.set_status(AdapterStatus::Running);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.base.set_status(AdapterStatus::Stopping);

        if let Some(task) = self.poll_task.lock().await.take() {
            task.abort();
        }

        self.base.set_status(AdapterStatus::Stopped);
        tracing::info!("Telegram adapter stopped");
        Ok(())
    }

    async fn send_message(&self, message: OutboundMessage) -> Result<String> {
        if !self.base.is_running() {
            return Err(Error::Channel("Telegram adapter not running".to_string()));
        }

        let mut last_id = String::new();
        for (i, part) in split_message(&message.content, MAX_MESSAGE_CHARS)
            .into_iter()
            .enumerate()
        {
            let mut body = serde_json::json!({
                "chat_id": message.chat_id,
                "text": part,
            });
            // Only the first part is threaded as a reply
            if let (0, Some(Ok(reply_to))) = (i, message.reply_to.as_deref().map(str::parse::<i64>)) {
                body["reply_to_message_id"] = serde_json::json!(reply_to);
            }
            let sent: Sent = self.call("sendMessage", body).await?;
            last_id = sent.message_id.to_string();
        }

        tracing::debug!(chat_id = %message.chat_id, message_id = %last_id, "Sent Telegram message");
        Ok(last_id)
    }

    async fn send_typing(&self, chat_id: &str) -> Result<()> {
        if !self.base.is_running() {
            return Err(Error::Channel("Telegram adapter not running".to_string()));
        }

        let _: bool = self
            .call(
                "sendChatAction",
                serde_json::json!({ "chat_id": chat_id, "action": "typing" }),
            )
            .await?;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.base.is_running()
    }
}
