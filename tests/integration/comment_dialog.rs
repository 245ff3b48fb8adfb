//! Comment dialog: button, then the next text message of the same chat.

use crate::helpers::{TestBot, col};
use goal_bot::Period;
use goal_bot::messages;

#[tokio::test]
async fn add_comment_offers_period_chooser() {
    let t = TestBot::new();
    t.register("10").await;
    t.press("10", "add_comment").await;

    let reply = t.last_to("10");
    assert_eq!(reply.text, messages::CHOOSE_COMMENT_PERIOD);
    assert_eq!(
        reply.keyboard.unwrap().tokens(),
        vec!["comment_daily", "comment_weekly", "comment_monthly"]
    );
}

#[tokio::test]
async fn next_text_is_saved_with_timestamp() {
    let t = TestBot::new();
    t.register("10").await;
    t.put(col::DAILY_GOAL, 2, "run");

    t.press("10", "comment_daily").await;
    assert_eq!(t.last_to("10").text, messages::ENTER_COMMENT);
    assert_eq!(t.bot.dialog().pending("10"), Some(Period::Daily));

    t.say("10", "done early").await;
    assert_eq!(
        t.last_to("10").text,
        "Your comment for the day goals has been saved."
    );
    assert_eq!(t.get(col::DAILY_COMMENT, 2).as_deref(), Some("done early"));
    let stamp = t.get(col::DAILY_UPDATED, 2).unwrap();
    assert_eq!(stamp.len(), "dd.mm.yyyy, HH:MM".len());
    assert_eq!(t.get(col::DAILY_GOAL, 2).as_deref(), Some("run"));
    assert_eq!(t.bot.dialog().pending("10"), None);
}

#[tokio::test]
async fn dialogs_are_isolated_per_chat() {
    let t = TestBot::new();
    t.register("10").await;
    t.register("20").await;

    t.press("10", "comment_daily").await;
    t.say("20", "not a comment").await;

    assert_eq!(t.last_to("20").text, messages::UNKNOWN_COMMAND);
    assert_eq!(t.get(col::DAILY_COMMENT, 12), None);
    assert_eq!(t.bot.dialog().pending("10"), Some(Period::Daily));

    t.say("10", "mine").await;
    assert_eq!(t.get(col::DAILY_COMMENT, 2).as_deref(), Some("mine"));
}

#[tokio::test]
async fn last_request_wins() {
    let t = TestBot::new();
    t.register("10").await;

    t.press("10", "comment_daily").await;
    t.press("10", "comment_monthly").await;
    t.say("10", "monthly note").await;

    assert_eq!(t.get(col::DAILY_COMMENT, 2), None);
    let comment = t.bot.goals().get_comment("10", Period::Monthly).await.unwrap();
    assert_eq!(comment, "monthly note");
}

#[tokio::test]
async fn failed_save_leaves_chat_idle() {
    let t = TestBot::new();
    t.register("10").await;
    t.press("10", "comment_weekly").await;

    t.store.set_unavailable(true);
    t.say("10", "lost").await;
    assert_eq!(t.last_to("10").text, messages::TRY_LATER);

    t.store.set_unavailable(false);
    t.say("10", "plain text").await;
    assert_eq!(t.last_to("10").text, messages::UNKNOWN_COMMAND);
}

#[tokio::test]
async fn comment_requires_registration() {
    let t = TestBot::new();
    t.press("10", "comment_daily").await;
    assert_eq!(t.last_to("10").text, messages::NOT_REGISTERED);
    assert_eq!(t.bot.dialog().pending("10"), None);
}
