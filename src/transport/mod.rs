//! Chat transport abstraction.
//!
//! The conversation engine only talks to a [`ChatTransport`]:
//! - Telegram Bot API over long polling
//! - Recording transport for tests

pub mod mock;
pub mod telegram;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::ledger::UserId;

pub use mock::{RecordingTransport, SentMessage};
pub use telegram::{TelegramConfig, TelegramTransport};

/// Destination chat (a private chat id equals the participant's user id)
pub type ChatId = i64;

/// Reference to media already held by the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub file_id: String,
    /// Duration metric reported by the transport
    pub duration_secs: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// `/name args`
    Command { name: String, args: String },
    Text(String),
    Media(MediaRef),
    /// Inline button press
    Button { callback_id: String, data: String },
}

/// One inbound update, already attributed to a participant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub user_id: UserId,
    pub chat_id: ChatId,
    /// Local time the transport reports for the update
    pub at: NaiveDateTime,
    pub kind: EventKind,
}

impl InboundEvent {
    /// Classify raw message text as a command or plain text
    pub fn from_text(user_id: UserId, chat_id: ChatId, at: NaiveDateTime, text: &str) -> Self {
        Self {
            user_id,
            chat_id,
            at,
            kind: parse_text(text),
        }
    }
}

fn parse_text(text: &str) -> EventKind {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix('/') {
        let (head, args) = match rest.split_once(char::is_whitespace) {
            Some((head, args)) => (head, args.trim()),
            None => (rest, ""),
        };
        // "/start@SomeBot" in group chats
        let name = head.split('@').next().unwrap_or(head);
        if !name.is_empty() {
            return EventKind::Command {
                name: name.to_string(),
                args: args.to_string(),
            };
        }
    }
    EventKind::Text(text.to_string())
}

/// Interactive button set attached to an outbound message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Keyboard {
    /// Persistent reply keyboard; presses arrive as plain text
    Reply(Vec<Vec<String>>),
    /// Inline buttons `(label, callback data)`; presses arrive as `Button`
    Inline(Vec<Vec<(String, String)>>),
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError>;

    async fn send_media(
        &self,
        chat_id: ChatId,
        media: &MediaRef,
        caption: &str,
    ) -> Result<(), TransportError>;

    /// Acknowledge an inline button press, optionally with a toast text
    async fn answer_button(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError>;
}
