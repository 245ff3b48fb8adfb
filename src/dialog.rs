//! Per-chat "awaiting comment" state.
//!
//! A chat that pressed a comment button has one pending period. The next
//! free-text message from that chat, and only that chat, is taken as the
//! comment.

use crate::error::Result;
use crate::goals::GoalStore;
use crate::period::Period;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

/// Pending comment requests keyed by chat id.
#[derive(Debug, Default)]
pub struct DialogController {
    pending: Mutex<HashMap<String, Period>>,
}

impl DialogController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for a comment on `period`. Returns the request it superseded.
    pub fn request_comment(&self, chat_id: &str, period: Period) -> Option<Period> {
        let superseded = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(chat_id.to_owned(), period);
        if let Some(old) = superseded {
            debug!(chat_id, %old, new = %period, "comment request superseded");
        }
        superseded
    }

    /// Remove and return the pending request of a chat.
    pub fn take_pending(&self, chat_id: &str) -> Option<Period> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(chat_id)
    }

    #[must_use]
    pub fn pending(&self, chat_id: &str) -> Option<Period> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(chat_id)
            .copied()
    }

    /// Treat `text` as the awaited comment, if one is awaited.
    ///
    /// Returns `None` when the chat has nothing pending. The request is
    /// cleared before the write, so a failed write leaves the chat idle.
    pub async fn on_next_message(
        &self,
        chat_id: &str,
        text: &str,
        goals: &GoalStore,
        now: DateTime<Utc>,
    ) -> Option<Result<Period>> {
        let period = self.take_pending(chat_id)?;
        Some(
            goals
                .set_comment(chat_id, period, text, now)
                .await
                .map(|()| period),
        )
    }

    /// Drop every pending request.
    pub fn clear(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let dropped = pending.len();
        pending.clear();
        info!(dropped, "dialog contexts cleared");
    }
}
