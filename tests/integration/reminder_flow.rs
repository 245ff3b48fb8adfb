//! Reminder firings under paused tokio time.

use crate::helpers::{TestBot, col, utc};
use std::time::Duration;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

/// Monday 2024-01-01 09:00 at UTC+3.
fn monday_morning() -> TestBot {
    TestBot::at(utc("2024-01-01T06:00:00Z"))
}

fn reminders(t: &TestBot, chat_id: &str) -> Vec<String> {
    t.adapter
        .sent_to(chat_id)
        .into_iter()
        .map(|m| m.text)
        .filter(|text| text.starts_with("Your goals for") || text.starts_with("Reminder:"))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn daily_reminder_fires_on_weekday_times() {
    let t = monday_morning();
    t.register("10").await;
    t.put(col::DAILY_GOAL, 2, "run");
    t.put(col::DAILY_GOAL, 4, "read");
    t.press("10", "enable_daily_reminder").await;

    tokio::time::sleep(31 * MINUTE).await;
    assert_eq!(
        reminders(&t, "10"),
        vec!["Your goals for the day:\n\n1. run\n2. read"]
    );

    // 19:30 local, then Tuesday 09:30.
    tokio::time::sleep(10 * HOUR).await;
    assert_eq!(reminders(&t, "10").len(), 2);
    tokio::time::sleep(14 * HOUR).await;
    assert_eq!(reminders(&t, "10").len(), 3);
}

#[tokio::test(start_paused = true)]
async fn re_enabling_does_not_double_deliver() {
    let t = monday_morning();
    t.register("10").await;
    for _ in 0..3 {
        t.press("10", "enable_daily_reminder").await;
    }

    tokio::time::sleep(31 * MINUTE).await;
    assert_eq!(
        reminders(&t, "10"),
        vec!["Reminder: you have no goals for the day yet."]
    );
}

#[tokio::test(start_paused = true)]
async fn weekly_reminder_waits_for_monday() {
    // Tuesday 2024-01-02 10:00 local.
    let t = TestBot::at(utc("2024-01-02T07:00:00Z"));
    t.register("10").await;
    t.put(col::WEEKLY_GOAL, 2, "ship");
    t.press("10", "enable_weekly_reminder").await;

    // Next Monday 09:35 local is 6 days 23h35m after the start.
    tokio::time::sleep(6 * 24 * HOUR + 23 * HOUR).await;
    assert!(reminders(&t, "10").is_empty());

    tokio::time::sleep(HOUR).await;
    assert_eq!(reminders(&t, "10"), vec!["Your goals for the week:\n\n1. ship"]);
}

#[tokio::test(start_paused = true)]
async fn disabled_reminder_stays_quiet() {
    let t = monday_morning();
    t.register("10").await;
    t.press("10", "enable_daily_reminder").await;
    t.press("10", "disable_daily_reminder").await;

    tokio::time::sleep(2 * 24 * HOUR).await;
    assert!(reminders(&t, "10").is_empty());
}

#[tokio::test(start_paused = true)]
async fn chats_fire_independently() {
    let t = monday_morning();
    t.register("10").await;
    t.register("20").await;
    t.put(col::DAILY_GOAL, 2, "ten");
    t.put(col::DAILY_GOAL, 12, "twenty");
    t.press("10", "enable_daily_reminder").await;
    t.press("20", "enable_daily_reminder").await;

    tokio::time::sleep(31 * MINUTE).await;
    assert_eq!(reminders(&t, "10"), vec!["Your goals for the day:\n\n1. ten"]);
    assert_eq!(reminders(&t, "20"), vec!["Your goals for the day:\n\n1. twenty"]);
}
