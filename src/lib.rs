//! Goal bot: a chat bot that reminds users of goals kept in a spreadsheet.
//!
//! # Architecture
//!
//! - **Store**: `TabularStore` over Google Sheets (or memory for tests)
//! - **Directory**: maps chat ids to fixed-size row blocks, allocating new ones
//! - **Goals**: reads goal rows and writes comments inside a block
//! - **Scheduler**: one cancellable timer task per enabled reminder
//! - **Dialog**: per-chat "awaiting comment" state
//! - **Channels**: Telegram long polling behind `ChannelAdapter`
//! - **Bot / runtime**: handlers and the event loop that drives them

pub mod bot;
pub mod channels;
pub mod config;
pub mod dialog;
pub mod directory;
pub mod error;
pub mod goals;
pub mod layout;
pub mod messages;
pub mod period;
pub mod runtime;
pub mod scheduler;
pub mod store;

pub use bot::GoalBot;
pub use config::BotConfig;
pub use directory::UserDirectory;
pub use error::{BotError, Result};
pub use goals::GoalStore;
pub use period::Period;
pub use scheduler::ReminderScheduler;
