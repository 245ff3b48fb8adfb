//! Configuration types for the goal bot.

use crate::error::{BotError, Result};
use crate::layout::ColumnLayout;
use crate::period::Period;
use crate::scheduler::trigger::{TimeOfDay, Trigger};
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable overriding `telegram.bot_token`.
pub const ENV_TELEGRAM_TOKEN: &str = "GOALBOT_TELEGRAM_TOKEN";

/// Environment variable overriding `sheets.access_token`.
pub const ENV_SHEETS_TOKEN: &str = "GOALBOT_SHEETS_TOKEN";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Telegram transport settings.
    pub telegram: TelegramConfig,
    /// Spreadsheet settings.
    pub sheets: SheetsConfig,
    /// Column layout of the user sheet.
    pub layout: LayoutConfig,
    /// Reminder rules.
    pub schedule: ScheduleConfig,
    /// Operator identity.
    pub admin: AdminConfig,
    /// Periodic directory sweep.
    pub maintenance: MaintenanceConfig,
}

/// Telegram Bot API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token issued by BotFather.
    pub bot_token: String,
    /// API base URL (overridable for tests and self-hosted Bot API servers).
    pub api_base_url: String,
    /// Long-poll timeout passed to `getUpdates`.
    pub poll_timeout_secs: u64,
    /// Outbound messages allowed per chat per minute.
    pub max_messages_per_minute: u32,
    /// Capacity of the inbound event queue.
    pub inbound_queue_size: usize,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_base_url: "https://api.telegram.org".to_owned(),
            poll_timeout_secs: 30,
            max_messages_per_minute: 20,
            inbound_queue_size: 64,
        }
    }
}

/// Google Sheets settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetsConfig {
    /// Spreadsheet id from the sheet URL.
    pub spreadsheet_id: String,
    /// Tab holding the user blocks.
    pub sheet_name: String,
    /// OAuth bearer token with the spreadsheets scope.
    pub access_token: String,
    /// API base URL.
    pub api_base_url: String,
    /// Per-request timeout.
    pub request_timeout_secs: u64,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            sheet_name: "Sheet1".to_owned(),
            access_token: String::new(),
            api_base_url: "https://sheets.googleapis.com".to_owned(),
            request_timeout_secs: 20,
        }
    }
}

/// Column letters of one period's cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodColumnsConfig {
    /// Goal texts, one per block row.
    pub goal: String,
    /// Latest comment (header row).
    pub comment: String,
    /// Last-updated timestamp (header row).
    pub updated: String,
}

impl PeriodColumnsConfig {
    fn new(goal: &str, comment: &str, updated: &str) -> Self {
        Self {
            goal: goal.to_owned(),
            comment: comment.to_owned(),
            updated: updated.to_owned(),
        }
    }
}

/// Column layout of the user sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Chat id column.
    pub id_column: String,
    /// Display name column.
    pub name_column: String,
    /// Header row of the first block.
    pub first_row: u32,
    /// Rows per block.
    pub block_size: u32,
    pub daily: PeriodColumnsConfig,
    pub weekly: PeriodColumnsConfig,
    pub monthly: PeriodColumnsConfig,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            id_column: "A".to_owned(),
            name_column: "B".to_owned(),
            first_row: 2,
            block_size: 10,
            daily: PeriodColumnsConfig::new("C", "D", "L"),
            weekly: PeriodColumnsConfig::new("E", "F", "M"),
            monthly: PeriodColumnsConfig::new("G", "H", "N"),
        }
    }
}

/// Reminder rules, evaluated at a fixed UTC offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Civil time offset from UTC, in hours.
    pub utc_offset_hours: i32,
    pub daily: Trigger,
    pub weekly: Trigger,
    pub monthly: Trigger,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: 3,
            daily: Trigger::FixedDailyTimes {
                weekdays: vec![
                    Weekday::Mon,
                    Weekday::Tue,
                    Weekday::Wed,
                    Weekday::Thu,
                    Weekday::Fri,
                ],
                times: vec![TimeOfDay::new(9, 30), TimeOfDay::new(19, 30)],
            },
            weekly: Trigger::Weekly {
                weekday: Weekday::Mon,
                time: TimeOfDay::new(9, 35),
            },
            monthly: Trigger::Monthly {
                day: 1,
                time: TimeOfDay::new(9, 40),
            },
        }
    }
}

impl ScheduleConfig {
    /// Rule for one period.
    #[must_use]
    pub fn trigger(&self, period: Period) -> &Trigger {
        match period {
            Period::Daily => &self.daily,
            Period::Weekly => &self.weekly,
            Period::Monthly => &self.monthly,
        }
    }

    /// The configured offset as a chrono [`FixedOffset`](chrono::FixedOffset).
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Config`] when the offset is outside ±23 hours.
    pub fn offset(&self) -> Result<chrono::FixedOffset> {
        self.utc_offset_hours
            .checked_mul(3600)
            .and_then(chrono::FixedOffset::east_opt)
            .ok_or_else(|| {
                BotError::Config(format!(
                    "schedule.utc_offset_hours {} is out of range",
                    self.utc_offset_hours
                ))
            })
    }
}

/// Operator identity allowed to run administrative commands.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Sender id of the operator. `None` disables administrative commands.
    pub operator_id: Option<String>,
}

/// Periodic sweep that drops cached users whose rows were deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Sweep interval in seconds (0 = disabled).
    pub sweep_interval_secs: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 300,
        }
    }
}

impl BotConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| BotError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| BotError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config dir>/goal-bot/config.toml`.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("goal-bot")
            .join("config.toml")
    }

    /// Replace secrets with values from the environment when present.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup(ENV_TELEGRAM_TOKEN).filter(|t| !t.trim().is_empty()) {
            self.telegram.bot_token = token;
        }
        if let Some(token) = lookup(ENV_SHEETS_TOKEN).filter(|t| !t.trim().is_empty()) {
            self.sheets.access_token = token;
        }
    }

    /// Resolve the column layout of the configured sheet.
    ///
    /// # Errors
    ///
    /// See [`ColumnLayout::from_config`].
    pub fn column_layout(&self) -> Result<ColumnLayout> {
        ColumnLayout::from_config(&self.sheets.sheet_name, &self.layout)
    }

    /// Check everything the bot needs before it starts.
    ///
    /// # Errors
    ///
    /// Returns the first [`BotError::Config`] problem found.
    pub fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            return Err(BotError::Config(format!(
                "telegram.bot_token is empty (set it or {ENV_TELEGRAM_TOKEN})"
            )));
        }
        if self.sheets.spreadsheet_id.trim().is_empty() {
            return Err(BotError::Config("sheets.spreadsheet_id is empty".to_owned()));
        }
        self.column_layout()?;
        self.schedule.offset()?;
        for period in Period::ALL {
            self.schedule
                .trigger(period)
                .validate()
                .map_err(|e| BotError::Config(format!("schedule.{period}: {e}")))?;
        }
        Ok(())
    }
}
