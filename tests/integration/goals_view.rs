//! Goal views and reminder toggles through callbacks.

use crate::helpers::{TestBot, col};
use goal_bot::Period;
use goal_bot::messages;

#[tokio::test]
async fn goals_view_lists_non_blank_goals() {
    let t = TestBot::new();
    t.register("10").await;
    t.put(col::DAILY_GOAL, 2, "run");
    t.put(col::DAILY_GOAL, 3, " ");
    t.put(col::DAILY_GOAL, 6, "read");
    t.put(col::DAILY_COMMENT, 2, "halfway");
    t.put(col::DAILY_UPDATED, 2, "02.01.2024, 00:00");

    t.press("10", "daily_goals").await;
    let reply = t.last_to("10");
    assert_eq!(
        reply.text,
        "Your goals for the day:\n\n1. run\n2. read\n\nComment: halfway (02.01.2024, 00:00)"
    );
    assert_eq!(
        reply.keyboard.unwrap().tokens(),
        vec!["enable_daily_reminder", "comment_daily"]
    );
    assert_eq!(t.adapter.answered(), vec!["cb-10-daily_goals"]);
}

#[tokio::test]
async fn empty_block_says_so() {
    let t = TestBot::new();
    t.register("10").await;
    t.put(col::WEEKLY_GOAL, 12, "not mine");

    t.press("10", "weekly_goals").await;
    assert_eq!(t.last_to("10").text, "Your goals for the week:\n\nNo goals yet.");
}

#[tokio::test]
async fn not_registered_and_store_outage_get_different_replies() {
    let t = TestBot::new();
    t.press("10", "daily_goals").await;
    assert_eq!(t.last_to("10").text, messages::NOT_REGISTERED);

    t.register("20").await;
    t.store.set_unavailable(true);
    t.press("20", "daily_goals").await;
    assert_eq!(t.last_to("20").text, messages::TRY_LATER);
}

#[tokio::test]
async fn unknown_callback_is_rejected() {
    let t = TestBot::new();
    t.register("10").await;
    t.press("10", "yearly_goals").await;
    assert_eq!(t.last_to("10").text, messages::UNKNOWN_COMMAND);
}

#[tokio::test]
async fn enable_then_disable_reminder() {
    let t = TestBot::new();
    t.register("10").await;

    t.press("10", "enable_weekly_reminder").await;
    let reply = t.last_to("10");
    assert_eq!(reply.text, "Weekly reminder enabled.");
    assert_eq!(reply.keyboard.unwrap().tokens(), vec!["add_comment"]);
    assert!(t.bot.scheduler().is_active("10", Period::Weekly));

    t.press("10", "enable_weekly_reminder").await;
    assert_eq!(t.last_to("10").text, "Weekly reminder rescheduled.");
    assert_eq!(t.bot.scheduler().active_count(), 1);

    t.press("10", "weekly_goals").await;
    assert_eq!(
        t.last_to("10").keyboard.unwrap().tokens(),
        vec!["disable_weekly_reminder", "comment_weekly"]
    );

    t.press("10", "disable_weekly_reminder").await;
    assert_eq!(t.last_to("10").text, "Weekly reminder disabled.");
    assert_eq!(t.bot.scheduler().active_count(), 0);
}

#[tokio::test]
async fn disable_without_reminder_reports_not_active() {
    let t = TestBot::new();
    t.register("10").await;
    t.press("10", "enable_daily_reminder").await;

    t.press("10", "disable_monthly_reminder").await;
    assert_eq!(t.last_to("10").text, messages::NO_ACTIVE_REMINDER);
    assert!(t.bot.scheduler().is_active("10", Period::Daily));
}

#[tokio::test]
async fn unregistered_chat_cannot_enable_reminders() {
    let t = TestBot::new();
    t.press("10", "enable_daily_reminder").await;
    assert_eq!(t.last_to("10").text, messages::NOT_REGISTERED);
    assert_eq!(t.bot.scheduler().active_count(), 0);
}
