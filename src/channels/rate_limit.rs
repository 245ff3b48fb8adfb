//! Rate limiting for outbound chat messages.
//!
//! Telegram throttles bots that flood a single chat. Each chat gets an
//! independent sliding one-minute window.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use thiserror::Error;

const WINDOW: Duration = Duration::from_secs(60);

/// Rate limiting error.
#[derive(Debug, Clone, Error)]
pub enum RateLimitError {
    /// Rate limit exceeded; must wait before sending.
    #[error("rate limit exceeded; retry after {retry_after_secs}s")]
    Exceeded {
        /// Seconds to wait before retry.
        retry_after_secs: u64,
    },
}

/// Sliding-window limiter for one chat.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    /// Maximum messages allowed per minute.
    max_messages_per_minute: u32,
    /// Sliding window of message timestamps.
    window: VecDeque<Instant>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given per-minute limit.
    #[must_use]
    pub fn new(max_messages_per_minute: u32) -> Self {
        Self {
            max_messages_per_minute,
            window: VecDeque::new(),
        }
    }

    /// Record a send at `now`, or report how long to wait.
    pub fn try_send_at(&mut self, now: Instant) -> Result<(), RateLimitError> {
        while let Some(&first) = self.window.front() {
            if now.duration_since(first) >= WINDOW {
                self.window.pop_front();
            } else {
                break;
            }
        }

        if self.window.len() >= self.max_messages_per_minute as usize {
            let retry_after_secs = self
                .window
                .front()
                .map(|&oldest| WINDOW.saturating_sub(now.duration_since(oldest)).as_secs() + 1)
                .unwrap_or(1);
            return Err(RateLimitError::Exceeded { retry_after_secs });
        }

        self.window.push_back(now);
        Ok(())
    }

    /// Record a send now, or report how long to wait.
    pub fn try_send(&mut self) -> Result<(), RateLimitError> {
        self.try_send_at(Instant::now())
    }

    /// `true` once every recorded send has left the window.
    fn is_idle_at(&self, now: Instant) -> bool {
        self.window
            .back()
            .is_none_or(|&last| now.duration_since(last) >= WINDOW)
    }

    /// Get the number of messages remaining in the current window.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.max_messages_per_minute
            .saturating_sub(self.window.len() as u32)
    }
}

/// Per-chat limiters sharing one limit.
#[derive(Debug)]
pub struct ChatRateLimiters {
    max_messages_per_minute: u32,
    limiters: HashMap<String, RateLimiter>,
}

impl ChatRateLimiters {
    /// A limit of 0 disables limiting.
    #[must_use]
    pub fn new(max_messages_per_minute: u32) -> Self {
        Self {
            max_messages_per_minute,
            limiters: HashMap::new(),
        }
    }

    /// Try to send a message to the given chat.
    pub fn try_send(&mut self, chat_id: &str) -> Result<(), RateLimitError> {
        self.try_send_at(chat_id, Instant::now())
    }

    /// [`Self::try_send`] at an explicit instant. Idle chats are dropped first.
    pub fn try_send_at(&mut self, chat_id: &str, now: Instant) -> Result<(), RateLimitError> {
        if self.max_messages_per_minute == 0 {
            return Ok(());
        }
        self.limiters.retain(|_, limiter| !limiter.is_idle_at(now));
        let limit = self.max_messages_per_minute;
        self.limiters
            .entry(chat_id.to_owned())
            .or_insert_with(|| RateLimiter::new(limit))
            .try_send_at(now)
    }

    /// Number of chats with sends inside their window.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.limiters.len()
    }

    /// Remaining messages for a chat; `None` for chats that never sent.
    #[must_use]
    pub fn remaining(&self, chat_id: &str) -> Option<u32> {
        self.limiters.get(chat_id).map(RateLimiter::remaining)
    }
}
