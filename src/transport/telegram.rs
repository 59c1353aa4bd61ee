//! Telegram Bot API transport (long polling).

use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime, TimeZone};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{ChatId, ChatTransport, EventKind, InboundEvent, Keyboard, MediaRef};
use crate::error::TransportError;

/// Transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot API base URL
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Long-poll timeout for getUpdates
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

fn default_api_base_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout() -> u64 {
    30
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            poll_timeout_secs: default_poll_timeout(),
        }
    }
}

/// Envelope every Bot API method answers with
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<Message>,
    #[serde(default)]
    callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct Message {
    date: i64,
    chat: Chat,
    #[serde(default)]
    from: Option<User>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    video: Option<Video>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct User {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct Video {
    file_id: String,
    #[serde(default)]
    duration: u32,
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    id: String,
    from: User,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    message: Option<Message>,
}

pub struct TelegramTransport {
    client: reqwest::Client,
    base_url: String,
    poll_timeout_secs: u64,
}

impl TelegramTransport {
    pub fn new(token: &str, config: &TelegramConfig) -> Result<Self, TransportError> {
        // Leave headroom over the long-poll timeout
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs + 15))
            .user_agent(concat!("engagement-bot/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: format!("{}/bot{}", config.api_base_url.trim_end_matches('/'), token),
            poll_timeout_secs: config.poll_timeout_secs,
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: Value) -> Result<T, TransportError> {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, method))
            .json(&body)
            .send()
            .await?;

        let envelope: ApiResponse<T> = response.json().await?;
        if !envelope.ok {
            return Err(TransportError::Api {
                code: envelope.error_code.unwrap_or_default(),
                description: envelope.description.unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        envelope
            .result
            .ok_or_else(|| TransportError::Decode(format!("{} returned no result", method)))
    }

    /// Long-poll for updates after `offset`.
    ///
    /// Returns the converted events and the offset to use for the next poll.
    pub async fn poll_updates(&self, offset: i64) -> Result<(Vec<InboundEvent>, i64), TransportError> {
        let updates: Vec<Value> = self
            .call(
                "getUpdates",
                json!({
                    "offset": offset,
                    "timeout": self.poll_timeout_secs,
                    "allowed_updates": ["message", "callback_query"],
                }),
            )
            .await?;

        Ok(decode_updates(updates, offset))
    }
}

/// Convert a raw `getUpdates` batch. Updates that fail to decode are skipped
/// but still advance the offset.
fn decode_updates(updates: Vec<Value>, offset: i64) -> (Vec<InboundEvent>, i64) {
    let mut next_offset = offset;
    let mut events = Vec::with_capacity(updates.len());
    for raw in updates {
        let Some(update_id) = raw.get("update_id").and_then(Value::as_i64) else {
            warn!("Skipping update without update_id");
            continue;
        };
        next_offset = next_offset.max(update_id + 1);

        let update: Update = match serde_json::from_value(raw) {
            Ok(update) => update,
            Err(e) => {
                warn!(update_id, error = %e, "Skipping malformed update");
                continue;
            }
        };
        match convert_update(update) {
            Some(event) => events.push(event),
            None => debug!(update_id, "Skipping unsupported update"),
        }
    }
    (events, next_offset)
}

fn local_time(unix_secs: i64) -> NaiveDateTime {
    match Local.timestamp_opt(unix_secs, 0).single() {
        Some(at) => at.naive_local(),
        None => {
            warn!(unix_secs, "Unrepresentable update timestamp, using current time");
            Local::now().naive_local()
        }
    }
}

fn convert_update(update: Update) -> Option<InboundEvent> {
    if let Some(query) = update.callback_query {
        let chat_id = query.message.as_ref().map(|m| m.chat.id).unwrap_or(query.from.id);
        let at = query
            .message
            .as_ref()
            .map(|m| local_time(m.date))
            .unwrap_or_else(|| Local::now().naive_local());
        return Some(InboundEvent {
            user_id: query.from.id,
            chat_id,
            at,
            kind: EventKind::Button {
                callback_id: query.id,
                data: query.data.unwrap_or_default(),
            },
        });
    }

    let message = update.message?;
    let user_id = message.from.as_ref()?.id;
    let at = local_time(message.date);

    if let Some(video) = message.video {
        return Some(InboundEvent {
            user_id,
            chat_id: message.chat.id,
            at,
            kind: EventKind::Media(MediaRef {
                file_id: video.file_id,
                duration_secs: video.duration,
            }),
        });
    }

    let text = message.text?;
    Some(InboundEvent::from_text(user_id, message.chat.id, at, &text))
}

fn keyboard_markup(keyboard: &Keyboard) -> Value {
    match keyboard {
        Keyboard::Reply(rows) => json!({
            "keyboard": rows
                .iter()
                .map(|row| row.iter().map(|label| json!({ "text": label })).collect::<Vec<_>>())
                .collect::<Vec<_>>(),
            "resize_keyboard": true,
            "one_time_keyboard": false,
        }),
        Keyboard::Inline(rows) => json!({
            "inline_keyboard": rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|(label, data)| json!({ "text": label, "callback_data": data }))
                        .collect::<Vec<_>>()
                })
                .collect::<Vec<_>>(),
        }),
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError> {
        let mut body = json!({ "chat_id": chat_id, "text": text });
        if let Some(keyboard) = keyboard {
            body["reply_markup"] = keyboard_markup(keyboard);
        }
        let _: Value = self.call("sendMessage", body).await?;
        Ok(())
    }

    async fn send_media(
        &self,
        chat_id: ChatId,
        media: &MediaRef,
        caption: &str,
    ) -> Result<(), TransportError> {
        let body = json!({ "chat_id": chat_id, "video": media.file_id, "caption": caption });
        let _: Value = self.call("sendVideo", body).await?;
        Ok(())
    }

    async fn answer_button(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError> {
        let mut body = json!({ "callback_query_id": callback_id });
        if let Some(text) = text {
            body["text"] = json!(text);
        }
        let _: bool = self.call("answerCallbackQuery", body).await?;
        Ok(())
    }
}
