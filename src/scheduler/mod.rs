//! Reminder scheduling.
//!
//! [`trigger`] holds the recurrence rules, [`runner`] the live jobs.

pub mod runner;
pub mod trigger;

pub use runner::{
    Clock, DisableOutcome, EnableOutcome, ReminderScheduler, SystemClock, TokioClock,
};
pub use trigger::{TimeOfDay, Trigger};
