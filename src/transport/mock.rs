//! Recording transport for testing.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ChatId, ChatTransport, Keyboard, MediaRef};
use crate::error::TransportError;

/// One delivered outbound call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentMessage {
    Text {
        chat_id: ChatId,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Media {
        chat_id: ChatId,
        media: MediaRef,
        caption: String,
    },
    ButtonAnswer {
        callback_id: String,
        text: Option<String>,
    },
}

impl SentMessage {
    pub fn chat_id(&self) -> Option<ChatId> {
        match self {
            SentMessage::Text { chat_id, .. } | SentMessage::Media { chat_id, .. } => Some(*chat_id),
            SentMessage::ButtonAnswer { .. } => None,
        }
    }

    /// Text body or caption
    pub fn body(&self) -> Option<&str> {
        match self {
            SentMessage::Text { text, .. } => Some(text.as_str()),
            SentMessage::Media { caption, .. } => Some(caption.as_str()),
            SentMessage::ButtonAnswer { text, .. } => text.as_deref(),
        }
    }
}

/// Transport that records every call and can fail on demand.
pub struct RecordingTransport {
    sent: Mutex<Vec<SentMessage>>,
    calls: AtomicU32,
    fail_calls: HashSet<u32>,
    fail_chats: HashSet<ChatId>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
            fail_calls: HashSet::new(),
            fail_chats: HashSet::new(),
        }
    }

    /// Fail the `n`th call (1-based, counting every call)
    pub fn failing_call(mut self, n: u32) -> Self {
        self.fail_calls.insert(n);
        self
    }

    /// Fail every send addressed to `chat_id`
    pub fn failing_chat(mut self, chat_id: ChatId) -> Self {
        self.fail_chats.insert(chat_id);
        self
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    /// Sent messages addressed to `chat_id`
    pub fn sent_to(&self, chat_id: ChatId) -> Vec<SentMessage> {
        self.sent()
            .into_iter()
            .filter(|msg| msg.chat_id() == Some(chat_id))
            .collect()
    }

    /// Bodies of everything sent to `chat_id`, in order
    pub fn texts_to(&self, chat_id: ChatId) -> Vec<String> {
        self.sent_to(chat_id)
            .iter()
            .filter_map(|msg| msg.body().map(str::to_string))
            .collect()
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.clear();
        }
    }

    fn deliver(&self, chat_id: Option<ChatId>, message: SentMessage) -> Result<(), TransportError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let chat_fails = chat_id.map(|id| self.fail_chats.contains(&id)).unwrap_or(false);
        if self.fail_calls.contains(&call) || chat_fails {
            return Err(TransportError::Injected(format!("call {} rejected", call)));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message);
        }
        Ok(())
    }
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError> {
        self.deliver(
            Some(chat_id),
            SentMessage::Text {
                chat_id,
                text: text.to_string(),
                keyboard: keyboard.cloned(),
            },
        )
    }

    async fn send_media(
        &self,
        chat_id: ChatId,
        media: &MediaRef,
        caption: &str,
    ) -> Result<(), TransportError> {
        self.deliver(
            Some(chat_id),
            SentMessage::Media {
                chat_id,
                media: media.clone(),
                caption: caption.to_string(),
            },
        )
    }

    async fn answer_button(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError> {
        self.deliver(
            None,
            SentMessage::ButtonAnswer {
                callback_id: callback_id.to_string(),
                text: text.map(str::to_string),
            },
        )
    }
}
