//! Error types for the goal bot.

/// Top-level error type for the goal bot.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// The chat has no block, or the block holds no data for a requested field.
    #[error("not found: {0}")]
    NotFound(String),

    /// Transient race while assigning a block; retried internally.
    #[error("allocation conflict: {0}")]
    AllocationConflict(String),

    /// The tabular store could not be reached or rejected the request.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Unknown period key.
    #[error("invalid period: {0}")]
    InvalidPeriod(String),

    /// A single reminder firing failed.
    #[error("reminder firing failed: {0}")]
    SchedulerFiring(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Messaging transport error.
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BotError {
    /// `true` for failures the user can fix by registering first.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// `true` for transient store failures worth retrying later.
    #[must_use]
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, BotError>;
