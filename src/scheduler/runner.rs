//! Live reminder jobs.
//!
//! Every enabled (chat, period) pair owns one spawned tokio task that sleeps
//! until the next firing of its [`Trigger`], loads the period's goals and
//! sends them. Jobs live only in memory; a restart forgets them.

use crate::channels::Messenger;
use crate::config::ScheduleConfig;
use crate::error::{BotError, Result};
use crate::goals::GoalStore;
use crate::messages;
use crate::period::Period;
use crate::scheduler::trigger::Trigger;
use chrono::{DateTime, FixedOffset, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The host clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall clock that advances with tokio's timer.
///
/// Under a paused test runtime it moves only when tokio time moves, so
/// firings line up with simulated sleeps.
#[derive(Debug, Clone)]
pub struct TokioClock {
    anchor: DateTime<Utc>,
    started: tokio::time::Instant,
}

impl TokioClock {
    /// A clock reading `anchor` right now.
    #[must_use]
    pub fn starting_at(anchor: DateTime<Utc>) -> Self {
        Self {
            anchor,
            started: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.started.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.anchor + elapsed
    }
}

/// Result of [`ReminderScheduler::enable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnableOutcome {
    /// No job existed for the key.
    Enabled,
    /// A live job was cancelled and replaced.
    Replaced,
}

/// Result of [`ReminderScheduler::disable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisableOutcome {
    Disabled,
    /// Nothing was scheduled; the registry is unchanged.
    NotActive,
}

type JobKey = (String, Period);

struct JobHandle {
    cancel: CancellationToken,
    generation: u64,
}

type Registry = Arc<Mutex<HashMap<JobKey, JobHandle>>>;

/// Everything a running job needs, cloned into its task.
#[derive(Clone)]
struct JobContext {
    goals: Arc<GoalStore>,
    messenger: Messenger,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
    registry: Registry,
}

/// Registry of live reminder jobs, at most one per (chat, period).
pub struct ReminderScheduler {
    goals: Arc<GoalStore>,
    messenger: Messenger,
    schedule: ScheduleConfig,
    offset: FixedOffset,
    clock: Arc<dyn Clock>,
    registry: Registry,
    next_generation: AtomicU64,
}

impl ReminderScheduler {
    /// # Errors
    ///
    /// Returns [`BotError::Config`] when the schedule offset is invalid.
    pub fn new(goals: Arc<GoalStore>, messenger: Messenger, schedule: ScheduleConfig) -> Result<Self> {
        let offset = schedule.offset()?;
        Ok(Self {
            goals,
            messenger,
            schedule,
            offset,
            clock: Arc::new(SystemClock),
            registry: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
        })
    }

    /// Replace the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Rule used for a period.
    #[must_use]
    pub fn trigger(&self, period: Period) -> &Trigger {
        self.schedule.trigger(period)
    }

    /// Next firing of a period's rule after the current time.
    #[must_use]
    pub fn next_firing(&self, period: Period) -> Option<DateTime<Utc>> {
        self.trigger(period).next_after(self.clock.now(), self.offset)
    }

    /// Start the reminder for a chat and period.
    ///
    /// A live job for the same key is cancelled first, so exactly one timer
    /// exists per key afterwards. Must be called inside a tokio runtime.
    pub fn enable(&self, chat_id: &str, period: Period) -> EnableOutcome {
        let key: JobKey = (chat_id.to_owned(), period);
        let cancel = CancellationToken::new();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        let previous = {
            let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
            let previous = registry.insert(
                key.clone(),
                JobHandle {
                    cancel: cancel.clone(),
                    generation,
                },
            );
            if let Some(old) = &previous {
                old.cancel.cancel();
            }
            previous
        };

        let ctx = JobContext {
            goals: Arc::clone(&self.goals),
            messenger: self.messenger.clone(),
            clock: Arc::clone(&self.clock),
            offset: self.offset,
            registry: Arc::clone(&self.registry),
        };
        let trigger = self.trigger(period).clone();
        info!(chat_id, %period, %trigger, "reminder enabled");
        tokio::spawn(run_job(ctx, key, generation, trigger, cancel));

        if previous.is_some() {
            EnableOutcome::Replaced
        } else {
            EnableOutcome::Enabled
        }
    }

    /// Stop the reminder for a chat and period.
    pub fn disable(&self, chat_id: &str, period: Period) -> DisableOutcome {
        let removed = self
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(chat_id.to_owned(), period));
        match removed {
            Some(job) => {
                job.cancel.cancel();
                info!(chat_id, %period, "reminder disabled");
                DisableOutcome::Disabled
            }
            None => {
                debug!(chat_id, %period, "disable requested without active reminder");
                DisableOutcome::NotActive
            }
        }
    }

    /// Cancel every job of one chat. Returns how many were cancelled.
    pub fn cancel_chat(&self, chat_id: &str) -> usize {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        let before = registry.len();
        registry.retain(|(chat, _), job| {
            if chat == chat_id {
                job.cancel.cancel();
                false
            } else {
                true
            }
        });
        let cancelled = before - registry.len();
        if cancelled > 0 {
            info!(chat_id, cancelled, "cancelled reminders of chat");
        }
        cancelled
    }

    /// Cancel every job. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let jobs: Vec<JobHandle> = self
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, job)| job)
            .collect();
        for job in &jobs {
            job.cancel.cancel();
        }
        jobs.len()
    }

    /// Cancel every job and forget the directory cache.
    pub fn clear_all(&self) {
        let cancelled = self.cancel_all();
        self.goals.directory().clear_cache();
        info!(cancelled, "all reminders cleared");
    }

    #[must_use]
    pub fn is_active(&self, chat_id: &str, period: Period) -> bool {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&(chat_id.to_owned(), period))
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

async fn run_job(
    ctx: JobContext,
    key: JobKey,
    generation: u64,
    trigger: Trigger,
    cancel: CancellationToken,
) {
    let chat_id = key.0.as_str();
    let period = key.1;
    let mut last_fired: Option<DateTime<Utc>> = None;

    loop {
        let now = ctx.clock.now();
        // Never compute from before the previous firing, even if the wall
        // clock lags the timer.
        let from = last_fired.map_or(now, |last| last.max(now));
        let Some(next) = trigger.next_after(from, ctx.offset) else {
            warn!(chat_id, %period, %trigger, "reminder rule has no future firing");
            break;
        };
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        debug!(chat_id, %period, next = %next, "reminder sleeping");

        tokio::select! {
            () = cancel.cancelled() => {
                debug!(chat_id, %period, "reminder cancelled");
                return;
            }
            () = tokio::time::sleep(wait) => {}
        }

        // The firing itself is not interrupted by cancellation.
        last_fired = Some(next);
        if let Err(e) = fire(&ctx, chat_id, period).await {
            error!(chat_id, %period, error = %e, "reminder firing failed");
            if let Err(send_err) = ctx.messenger.send(chat_id, messages::TRY_LATER).await {
                debug!(chat_id, error = %send_err, "could not report failed firing");
            }
        }
    }

    let mut registry = ctx.registry.lock().unwrap_or_else(PoisonError::into_inner);
    if registry.get(&key).is_some_and(|job| job.generation == generation) {
        registry.remove(&key);
    }
}

async fn fire(ctx: &JobContext, chat_id: &str, period: Period) -> Result<()> {
    let goals = ctx
        .goals
        .get_goals(chat_id, period)
        .await
        .map_err(|e| BotError::SchedulerFiring(format!("loading {period} goals: {e}")))?;
    ctx.messenger
        .send(chat_id, messages::reminder(period, &goals))
        .await
        .map_err(|e| BotError::SchedulerFiring(format!("delivering {period} reminder: {e}")))?;
    debug!(chat_id, %period, count = goals.len(), "reminder delivered");
    Ok(())
}
