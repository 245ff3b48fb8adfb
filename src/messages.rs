//! Reply texts and keyboards.

use crate::channels::{InlineButton, Keyboard};
use crate::goals::GoalEntry;
use crate::period::Period;

/// Callback token that opens the goals view of a period.
#[must_use]
pub fn goals_token(period: Period) -> String {
    format!("{}_goals", period.key())
}

/// Callback token that enables a period's reminder.
#[must_use]
pub fn enable_token(period: Period) -> String {
    format!("enable_{}_reminder", period.key())
}

/// Callback token that disables a period's reminder.
#[must_use]
pub fn disable_token(period: Period) -> String {
    format!("disable_{}_reminder", period.key())
}

/// Callback token that starts the comment dialog for a period.
#[must_use]
pub fn comment_token(period: Period) -> String {
    format!("comment_{}", period.key())
}

/// Callback token that opens the comment period chooser.
pub const ADD_COMMENT_TOKEN: &str = "add_comment";

/// Three buttons opening the goal views.
#[must_use]
pub fn main_menu() -> Keyboard {
    Keyboard::row(
        Period::ALL
            .iter()
            .map(|&p| InlineButton::new(format!("Goals for the {}", p.noun()), goals_token(p)))
            .collect(),
    )
}

/// Buttons under a goals view.
#[must_use]
pub fn goals_actions(period: Period, reminder_active: bool) -> Keyboard {
    let toggle = if reminder_active {
        InlineButton::new("Disable reminder", disable_token(period))
    } else {
        InlineButton::new("Enable reminder", enable_token(period))
    };
    Keyboard::row(vec![
        toggle,
        InlineButton::new("Add comment", comment_token(period)),
    ])
}

/// Period chooser for the comment dialog.
#[must_use]
pub fn comment_chooser() -> Keyboard {
    Keyboard::row(
        Period::ALL
            .iter()
            .map(|&p| InlineButton::new(capitalized(p.noun()), comment_token(p)))
            .collect(),
    )
}

/// Single "Comments" button shown after a reminder is enabled.
#[must_use]
pub fn comment_button() -> Keyboard {
    Keyboard::row(vec![InlineButton::new("Comments", ADD_COMMENT_TOKEN)])
}

/// `1. first\n2. second`.
#[must_use]
pub fn numbered(goals: &[String]) -> String {
    goals
        .iter()
        .enumerate()
        .map(|(i, goal)| format!("{}. {goal}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

#[must_use]
pub fn welcome(display_name: &str, chat_id: &str) -> String {
    format!(
        "Hello, {display_name}, your ID is {chat_id}! I will remind you of your goals."
    )
}

pub const ALREADY_REGISTERED: &str = "You are already registered. Choose an option.";

/// Goal list with the latest comment.
#[must_use]
pub fn goals_view(entry: &GoalEntry) -> String {
    let mut text = format!("Your goals for the {}:\n\n", entry.period.noun());
    if entry.goals.is_empty() {
        text.push_str("No goals yet.");
    } else {
        text.push_str(&numbered(&entry.goals));
    }
    if !entry.comment.trim().is_empty() {
        text.push_str(&format!("\n\nComment: {}", entry.comment));
        if let Some(updated) = &entry.last_updated {
            text.push_str(&format!(" ({updated})"));
        }
    }
    text
}

/// Body of a reminder firing.
#[must_use]
pub fn reminder(period: Period, goals: &[String]) -> String {
    if goals.is_empty() {
        return format!(
            "Reminder: you have no goals for the {} yet.",
            period.noun()
        );
    }
    format!("Your goals for the {}:\n\n{}", period.noun(), numbered(goals))
}

#[must_use]
pub fn reminder_enabled(period: Period, replaced: bool) -> String {
    if replaced {
        format!("{} reminder rescheduled.", capitalized(period.key()))
    } else {
        format!("{} reminder enabled.", capitalized(period.key()))
    }
}

#[must_use]
pub fn reminder_disabled(period: Period) -> String {
    format!("{} reminder disabled.", capitalized(period.key()))
}

pub const NO_ACTIVE_REMINDER: &str = "You have no active reminder of this type.";

pub const CHOOSE_COMMENT_PERIOD: &str = "Choose which goals the comment is for:";

pub const ENTER_COMMENT: &str = "Enter your comment:";

#[must_use]
pub fn comment_saved(period: Period) -> String {
    format!("Your comment for the {} goals has been saved.", period.noun())
}

pub const NOT_REGISTERED: &str = "You are not registered yet. Send /start first.";

pub const TRY_LATER: &str = "Something went wrong while processing your data. Please try again later.";

pub const REGISTRATION_FAILED: &str = "Registration failed. Please try again later.";

pub const CACHE_CLEARED: &str = "Cache cleared.";

pub const NOT_ALLOWED: &str = "You are not allowed to run this command.";

pub const UNKNOWN_COMMAND: &str = "Unknown command. Send /start to see the menu.";

fn capitalized(word: &str) -> String {
    let mut chars = word.chars();
    chars
        .next()
        .map(|c| c.to_ascii_uppercase().to_string() + chars.as_str())
        .unwrap_or_default()
}
