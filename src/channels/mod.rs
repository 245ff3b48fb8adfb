//! Messaging transport.
//!
//! Design goal: transports are pluggable behind [`ChannelAdapter`]. The bot
//! only talks to a [`Messenger`], which applies per-chat rate limits in front
//! of the adapter and turns transport failures into [`BotError::Channel`].

pub mod rate_limit;
pub mod recording;
pub mod telegram;
pub mod traits;

pub use recording::RecordingAdapter;
pub use telegram::TelegramAdapter;
pub use traits::{
    ChannelAdapter, ChannelInboundMessage, ChannelOutboundMessage, InboundKind, InlineButton,
    Keyboard,
};

use crate::channels::rate_limit::ChatRateLimiters;
use crate::error::{BotError, Result};
use std::sync::{Arc, Mutex, PoisonError};

/// Outbound side of the transport shared by handlers and reminder jobs.
#[derive(Clone)]
pub struct Messenger {
    adapter: Arc<dyn ChannelAdapter>,
    limiters: Arc<Mutex<ChatRateLimiters>>,
}

impl Messenger {
    /// `max_messages_per_minute` of 0 disables rate limiting.
    #[must_use]
    pub fn new(adapter: Arc<dyn ChannelAdapter>, max_messages_per_minute: u32) -> Self {
        Self {
            adapter,
            limiters: Arc::new(Mutex::new(ChatRateLimiters::new(max_messages_per_minute))),
        }
    }

    /// Send plain text.
    pub async fn send(&self, chat_id: &str, text: impl Into<String>) -> Result<()> {
        self.deliver(chat_id, text.into(), None).await
    }

    /// Send text with an inline keyboard.
    pub async fn send_with_keyboard(
        &self,
        chat_id: &str,
        text: impl Into<String>,
        keyboard: Keyboard,
    ) -> Result<()> {
        self.deliver(chat_id, text.into(), Some(keyboard)).await
    }

    async fn deliver(&self, chat_id: &str, text: String, keyboard: Option<Keyboard>) -> Result<()> {
        self.limiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_send(chat_id)
            .map_err(|e| BotError::Channel(format!("chat {chat_id}: {e}")))?;

        self.adapter
            .send(ChannelOutboundMessage {
                chat_id: chat_id.to_owned(),
                text,
                keyboard,
            })
            .await
            .map_err(|e| BotError::Channel(format!("{} send failed: {e}", self.adapter.id())))
    }

    /// Acknowledge a pressed button. Failures are logged, not returned.
    pub async fn answer_callback(&self, callback_id: &str) {
        if let Err(e) = self.adapter.answer_callback(callback_id).await {
            tracing::warn!(callback_id, error = %e, "failed to answer callback");
        }
    }
}
