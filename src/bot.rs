//! Inbound event handlers.
//!
//! [`GoalBot`] owns the directory, goal store, scheduler and dialog state of
//! one deployment and turns each inbound command, button press or text
//! message into calls on them plus a reply.

use crate::channels::{ChannelAdapter, ChannelInboundMessage, InboundKind, Messenger};
use crate::config::BotConfig;
use crate::dialog::DialogController;
use crate::directory::UserDirectory;
use crate::error::{BotError, Result};
use crate::goals::GoalStore;
use crate::messages;
use crate::period::Period;
use crate::scheduler::{Clock, DisableOutcome, EnableOutcome, ReminderScheduler, SystemClock};
use crate::store::TabularStore;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What a callback token asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ShowGoals(Period),
    EnableReminder(Period),
    DisableReminder(Period),
    /// Show the period chooser for a comment.
    ChooseComment,
    Comment(Period),
}

impl Action {
    /// Parse a callback token such as `weekly_goals` or `comment_daily`.
    ///
    /// # Errors
    ///
    /// [`BotError::InvalidPeriod`] for tokens that name no known action or
    /// an unknown period.
    pub fn parse(token: &str) -> Result<Self> {
        let token = token.trim();
        if token == messages::ADD_COMMENT_TOKEN {
            return Ok(Self::ChooseComment);
        }
        if let Some(period) = token.strip_suffix("_goals") {
            return Ok(Self::ShowGoals(period.parse()?));
        }
        if let Some(period) = token
            .strip_prefix("enable_")
            .and_then(|rest| rest.strip_suffix("_reminder"))
        {
            return Ok(Self::EnableReminder(period.parse()?));
        }
        if let Some(period) = token
            .strip_prefix("disable_")
            .and_then(|rest| rest.strip_suffix("_reminder"))
        {
            return Ok(Self::DisableReminder(period.parse()?));
        }
        if let Some(period) = token.strip_prefix("comment_") {
            return Ok(Self::Comment(period.parse()?));
        }
        Err(BotError::InvalidPeriod(format!("unknown action {token:?}")))
    }
}

/// Handlers for one bot deployment.
pub struct GoalBot {
    directory: Arc<UserDirectory>,
    goals: Arc<GoalStore>,
    scheduler: Arc<ReminderScheduler>,
    dialog: DialogController,
    messenger: Messenger,
    clock: Arc<dyn Clock>,
    operator_id: Option<String>,
}

impl GoalBot {
    /// Wire every component from configuration.
    ///
    /// # Errors
    ///
    /// [`BotError::Config`] when the layout or schedule is invalid.
    pub fn new(
        store: Arc<dyn TabularStore>,
        adapter: Arc<dyn ChannelAdapter>,
        config: &BotConfig,
    ) -> Result<Self> {
        Self::with_clock(store, adapter, config, Arc::new(SystemClock))
    }

    /// Like [`Self::new`] with an explicit time source.
    pub fn with_clock(
        store: Arc<dyn TabularStore>,
        adapter: Arc<dyn ChannelAdapter>,
        config: &BotConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let layout = config.column_layout()?;
        let offset = config.schedule.offset()?;
        let directory = Arc::new(UserDirectory::new(store, layout));
        let goals = Arc::new(GoalStore::new(Arc::clone(&directory), offset));
        let messenger = Messenger::new(adapter, config.telegram.max_messages_per_minute);
        let scheduler = ReminderScheduler::new(
            Arc::clone(&goals),
            messenger.clone(),
            config.schedule.clone(),
        )?
        .with_clock(Arc::clone(&clock));

        Ok(Self {
            directory,
            goals,
            scheduler: Arc::new(scheduler),
            dialog: DialogController::new(),
            messenger,
            clock,
            operator_id: config
                .admin
                .operator_id
                .as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_owned),
        })
    }

    #[must_use]
    pub fn directory(&self) -> &Arc<UserDirectory> {
        &self.directory
    }

    #[must_use]
    pub fn goals(&self) -> &Arc<GoalStore> {
        &self.goals
    }

    #[must_use]
    pub fn scheduler(&self) -> &Arc<ReminderScheduler> {
        &self.scheduler
    }

    #[must_use]
    pub fn dialog(&self) -> &DialogController {
        &self.dialog
    }

    /// `true` when `sender` may run administrative commands.
    #[must_use]
    pub fn is_operator(&self, sender: &str) -> bool {
        self.operator_id.as_deref() == Some(sender.trim())
    }

    /// Handle one inbound event and reply to its chat.
    ///
    /// Failures are logged and answered with a user-facing message; nothing
    /// propagates to the caller.
    pub async fn handle(&self, message: ChannelInboundMessage) {
        let chat_id = message.chat_id.as_str();
        let result = match &message.kind {
            InboundKind::Command { name, .. } => self.on_command(&message, name).await,
            InboundKind::Callback { token, callback_id } => {
                self.messenger.answer_callback(callback_id).await;
                self.on_callback(chat_id, token).await
            }
            InboundKind::Text { text } => self.on_text(chat_id, text).await,
        };
        if let Err(e) = result {
            self.report(chat_id, &e).await;
        }
    }

    async fn report(&self, chat_id: &str, e: &BotError) {
        let reply = match e {
            BotError::NotFound(_) => {
                warn!(chat_id, error = %e, "request from unregistered chat");
                messages::NOT_REGISTERED
            }
            BotError::StoreUnavailable(_) => {
                error!(chat_id, error = %e, "store unavailable while handling request");
                messages::TRY_LATER
            }
            BotError::InvalidPeriod(_) => {
                warn!(chat_id, error = %e, "unrecognised request");
                messages::UNKNOWN_COMMAND
            }
            BotError::Channel(_) => {
                warn!(chat_id, error = %e, "reply could not be delivered");
                return;
            }
            _ => {
                error!(chat_id, error = %e, "request failed");
                messages::TRY_LATER
            }
        };
        if let Err(send_err) = self.messenger.send(chat_id, reply).await {
            warn!(chat_id, error = %send_err, "failed to deliver error reply");
        }
    }

    async fn on_command(&self, message: &ChannelInboundMessage, name: &str) -> Result<()> {
        debug!(chat_id = %message.chat_id, command = name, "command received");
        match name {
            "start" => self.on_start(message).await,
            "clear_cache" => self.on_clear_cache(message).await,
            _ => self.messenger.send(&message.chat_id, messages::UNKNOWN_COMMAND).await,
        }
    }

    async fn on_start(&self, message: &ChannelInboundMessage) -> Result<()> {
        let chat_id = message.chat_id.as_str();
        let name = if message.display_name.trim().is_empty() {
            chat_id
        } else {
            message.display_name.trim()
        };

        let registration = match self.directory.register(chat_id, name).await {
            Ok(registration) => registration,
            Err(e) if e.is_store_unavailable() => {
                error!(chat_id, error = %e, "registration failed");
                return self
                    .messenger
                    .send(chat_id, messages::REGISTRATION_FAILED)
                    .await;
            }
            Err(e) => return Err(e),
        };

        let text = if registration.created {
            messages::welcome(name, chat_id)
        } else {
            messages::ALREADY_REGISTERED.to_owned()
        };
        self.messenger
            .send_with_keyboard(chat_id, text, messages::main_menu())
            .await
    }

    async fn on_clear_cache(&self, message: &ChannelInboundMessage) -> Result<()> {
        if !self.is_operator(&message.sender) {
            warn!(
                chat_id = %message.chat_id,
                sender = %message.sender,
                "clear_cache refused for non-operator"
            );
            return self
                .messenger
                .send(&message.chat_id, messages::NOT_ALLOWED)
                .await;
        }
        self.scheduler.clear_all();
        self.dialog.clear();
        info!(sender = %message.sender, "caches cleared by operator");
        self.messenger
            .send(&message.chat_id, messages::CACHE_CLEARED)
            .await
    }

    async fn on_callback(&self, chat_id: &str, token: &str) -> Result<()> {
        let action = Action::parse(token)?;
        debug!(chat_id, ?action, "callback received");
        match action {
            Action::ShowGoals(period) => {
                let entry = self.goals.entry(chat_id, period).await?;
                let active = self.scheduler.is_active(chat_id, period);
                self.messenger
                    .send_with_keyboard(
                        chat_id,
                        messages::goals_view(&entry),
                        messages::goals_actions(period, active),
                    )
                    .await
            }
            Action::EnableReminder(period) => {
                self.directory.lookup(chat_id).await?;
                let outcome = self.scheduler.enable(chat_id, period);
                self.messenger
                    .send_with_keyboard(
                        chat_id,
                        messages::reminder_enabled(period, outcome == EnableOutcome::Replaced),
                        messages::comment_button(),
                    )
                    .await
            }
            Action::DisableReminder(period) => {
                let reply = match self.scheduler.disable(chat_id, period) {
                    DisableOutcome::Disabled => messages::reminder_disabled(period),
                    DisableOutcome::NotActive => messages::NO_ACTIVE_REMINDER.to_owned(),
                };
                self.messenger.send(chat_id, reply).await
            }
            Action::ChooseComment => {
                self.messenger
                    .send_with_keyboard(
                        chat_id,
                        messages::CHOOSE_COMMENT_PERIOD,
                        messages::comment_chooser(),
                    )
                    .await
            }
            Action::Comment(period) => {
                self.directory.lookup(chat_id).await?;
                self.dialog.request_comment(chat_id, period);
                self.messenger.send(chat_id, messages::ENTER_COMMENT).await
            }
        }
    }

    async fn on_text(&self, chat_id: &str, text: &str) -> Result<()> {
        match self
            .dialog
            .on_next_message(chat_id, text, &self.goals, self.clock.now())
            .await
        {
            Some(Ok(period)) => {
                self.messenger
                    .send(chat_id, messages::comment_saved(period))
                    .await
            }
            Some(Err(e)) => Err(e),
            None => self.messenger.send(chat_id, messages::UNKNOWN_COMMAND).await,
        }
    }

    /// Evict users whose rows disappeared and tear down their state.
    ///
    /// # Errors
    ///
    /// [`BotError::StoreUnavailable`] when the store cannot be scanned.
    pub async fn sweep(&self) -> Result<Vec<String>> {
        let evicted = self.directory.prune_missing().await?;
        for chat_id in &evicted {
            self.scheduler.cancel_chat(chat_id);
            self.dialog.take_pending(chat_id);
        }
        Ok(evicted)
    }
}
