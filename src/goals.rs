//! Goal store: goal texts, comments and timestamps inside a user's block.

use crate::directory::UserDirectory;
use crate::error::{BotError, Result};
use crate::period::Period;
use crate::store::first_cell;
use chrono::{DateTime, FixedOffset, Utc};
use std::sync::Arc;
use tracing::{debug, error};

/// Timestamp format written next to a comment (`dd.mm.yyyy, HH:MM`).
pub const TIMESTAMP_FORMAT: &str = "%d.%m.%Y, %H:%M";

/// Everything stored for one period of one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalEntry {
    pub period: Period,
    /// Non-blank goals in row order.
    pub goals: Vec<String>,
    /// Latest comment, empty when none.
    pub comment: String,
    /// Text of the last-updated cell, if set.
    pub last_updated: Option<String>,
}

/// Format `now` in the given civil offset as `dd.mm.yyyy, HH:MM`.
#[must_use]
pub fn format_timestamp(now: DateTime<Utc>, offset: FixedOffset) -> String {
    now.with_timezone(&offset).format(TIMESTAMP_FORMAT).to_string()
}

/// Reads and writes goal data of registered users.
pub struct GoalStore {
    directory: Arc<UserDirectory>,
    offset: FixedOffset,
}

impl GoalStore {
    /// `offset` is the civil offset comment timestamps are recorded in.
    #[must_use]
    pub fn new(directory: Arc<UserDirectory>, offset: FixedOffset) -> Self {
        Self { directory, offset }
    }

    /// The directory used to resolve blocks.
    #[must_use]
    pub fn directory(&self) -> &Arc<UserDirectory> {
        &self.directory
    }

    /// Non-blank goals of a period, in row order.
    ///
    /// # Errors
    ///
    /// [`BotError::NotFound`] when the chat has no block,
    /// [`BotError::StoreUnavailable`] on store failure.
    pub async fn get_goals(&self, chat_id: &str, period: Period) -> Result<Vec<String>> {
        let block_start = self.directory.lookup(chat_id).await?;
        let range = self.directory.layout().goal_range(block_start, period);
        let rows = self.directory.store().read(&range).await?;
        let goals: Vec<String> = rows
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .map(|goal| goal.trim().to_owned())
            .filter(|goal| !goal.is_empty())
            .collect();
        debug!(chat_id, %period, count = goals.len(), "loaded goals");
        Ok(goals)
    }

    /// Latest comment of a period, `""` when none.
    pub async fn get_comment(&self, chat_id: &str, period: Period) -> Result<String> {
        let block_start = self.directory.lookup(chat_id).await?;
        let cell = self.directory.layout().comment_cell(block_start, period);
        let rows = self.directory.store().read(&cell).await?;
        Ok(first_cell(&rows))
    }

    /// Recorded timestamp of the latest comment, if any.
    pub async fn get_last_updated(&self, chat_id: &str, period: Period) -> Result<Option<String>> {
        let block_start = self.directory.lookup(chat_id).await?;
        let cell = self.directory.layout().updated_cell(block_start, period);
        let rows = self.directory.store().read(&cell).await?;
        let value = first_cell(&rows);
        Ok((!value.trim().is_empty()).then_some(value))
    }

    /// Goals, comment and timestamp of one period.
    pub async fn entry(&self, chat_id: &str, period: Period) -> Result<GoalEntry> {
        Ok(GoalEntry {
            period,
            goals: self.get_goals(chat_id, period).await?,
            comment: self.get_comment(chat_id, period).await?,
            last_updated: self.get_last_updated(chat_id, period).await?,
        })
    }

    /// Store a comment and stamp it with `now`.
    ///
    /// The comment cell is written first, then the timestamp cell. The store
    /// has no multi-cell transaction, so a failed timestamp write leaves the
    /// new comment in place with the old timestamp; that is logged and the
    /// error returned.
    ///
    /// # Errors
    ///
    /// [`BotError::NotFound`] when the chat has no block,
    /// [`BotError::StoreUnavailable`] when either write fails.
    pub async fn set_comment(
        &self,
        chat_id: &str,
        period: Period,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let block_start = self.directory.lookup(chat_id).await?;
        let layout = self.directory.layout();
        let store = self.directory.store();

        store
            .write(
                &layout.comment_cell(block_start, period),
                vec![vec![text.to_owned()]],
            )
            .await?;

        let stamp = format_timestamp(now, self.offset);
        if let Err(e) = store
            .write(
                &layout.updated_cell(block_start, period),
                vec![vec![stamp.clone()]],
            )
            .await
        {
            error!(
                chat_id,
                %period,
                block_start,
                error = %e,
                "comment saved but timestamp write failed; block left partially updated"
            );
            return Err(BotError::StoreUnavailable(format!(
                "comment saved without timestamp: {e}"
            )));
        }

        debug!(chat_id, %period, %stamp, "comment saved");
        Ok(())
    }
}
