//! In-process adapter that records outbound messages.
//!
//! Used by tests: inbound messages are scripted up front
//! and outbound messages are kept for inspection instead of being delivered.

use crate::channels::traits::{ChannelAdapter, ChannelInboundMessage, ChannelOutboundMessage};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::{Notify, mpsc};

/// Adapter that keeps everything in memory.
#[derive(Default)]
pub struct RecordingAdapter {
    sent: Mutex<Vec<ChannelOutboundMessage>>,
    answered: Mutex<Vec<String>>,
    script: Mutex<VecDeque<ChannelInboundMessage>>,
    fail_sends: AtomicBool,
    sent_notify: Notify,
}

impl RecordingAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue inbound messages that [`ChannelAdapter::run`] will emit.
    pub fn script(&self, messages: impl IntoIterator<Item = ChannelInboundMessage>) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(messages);
    }

    /// Make every subsequent send fail.
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Messages sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<ChannelOutboundMessage> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Messages sent to one chat.
    #[must_use]
    pub fn sent_to(&self, chat_id: &str) -> Vec<ChannelOutboundMessage> {
        self.sent()
            .into_iter()
            .filter(|m| m.chat_id == chat_id)
            .collect()
    }

    /// Callback ids acknowledged so far.
    #[must_use]
    pub fn answered(&self) -> Vec<String> {
        self.answered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Wait until at least `count` messages have been sent.
    pub async fn wait_for_sent(&self, count: usize) {
        loop {
            let notified = self.sent_notify.notified();
            if self.sent().len() >= count {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl ChannelAdapter for RecordingAdapter {
    fn id(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, message: ChannelOutboundMessage) -> anyhow::Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            anyhow::bail!("recording adapter configured to fail");
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
        self.sent_notify.notify_waiters();
        Ok(())
    }

    async fn run(&self, inbound_tx: mpsc::Sender<ChannelInboundMessage>) -> anyhow::Result<()> {
        loop {
            let next = self
                .script
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            let Some(message) = next else {
                break;
            };
            if inbound_tx.send(message).await.is_err() {
                return Ok(());
            }
        }
        // Scripted input exhausted; stay connected like a real transport.
        std::future::pending::<()>().await;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> anyhow::Result<()> {
        self.answered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(callback_id.to_owned());
        Ok(())
    }

    async fn health_check(&self) -> anyhow::Result<bool> {
        Ok(true)
    }
}
