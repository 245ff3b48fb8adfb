//! Telegram Bot API contract tests.

use goal_bot::channels::{
    ChannelAdapter, ChannelOutboundMessage, InboundKind, InlineButton, Keyboard, TelegramAdapter,
};
use goal_bot::config::TelegramConfig;
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "123:abc";

fn adapter(server: &MockServer) -> TelegramAdapter {
    TelegramAdapter::new(&TelegramConfig {
        bot_token: TOKEN.to_owned(),
        api_base_url: server.uri(),
        poll_timeout_secs: 1,
        ..TelegramConfig::default()
    })
    .unwrap()
}

fn method_path(name: &str) -> String {
    format!("/bot{TOKEN}/{name}")
}

#[tokio::test]
async fn send_message_carries_inline_keyboard() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(method_path("sendMessage")))
        .and(body_partial_json(json!({
            "chat_id": 42,
            "text": "pick one",
            "reply_markup": {
                "inline_keyboard": [[{ "text": "Day", "callback_data": "comment_daily" }]]
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": { "message_id": 1 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    adapter(&server)
        .send(ChannelOutboundMessage {
            chat_id: "42".to_owned(),
            text: "pick one".to_owned(),
            keyboard: Some(Keyboard::row(vec![InlineButton::new("Day", "comment_daily")])),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn api_error_surfaces_description() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(method_path("sendMessage")))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "ok": false,
            "description": "Forbidden: bot was blocked by the user"
        })))
        .mount(&server)
        .await;

    let err = adapter(&server)
        .send(ChannelOutboundMessage {
            chat_id: "42".to_owned(),
            text: "hi".to_owned(),
            keyboard: None,
        })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("blocked by the user"));
}

#[tokio::test]
async fn answer_callback_posts_query_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(method_path("answerCallbackQuery")))
        .and(body_partial_json(json!({ "callback_query_id": "cb-9" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "result": true })))
        .expect(1)
        .mount(&server)
        .await;

    adapter(&server).answer_callback("cb-9").await.unwrap();
}

#[tokio::test]
async fn health_check_reads_get_me() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(method_path("getMe")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": { "id": 123, "is_bot": true, "first_name": "Goals" }
        })))
        .mount(&server)
        .await;

    assert!(adapter(&server).health_check().await.unwrap());
}

#[tokio::test]
async fn long_poll_delivers_commands_and_callbacks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(method_path("getUpdates")))
        .and(body_partial_json(json!({ "offset": 0 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": [
                {
                    "update_id": 500,
                    "message": {
                        "chat": { "id": 42, "first_name": "Ann" },
                        "from": { "id": 42, "first_name": "Ann" },
                        "text": "/start"
                    }
                },
                {
                    "update_id": 501,
                    "callback_query": {
                        "id": "cb-1",
                        "from": { "id": 42, "first_name": "Ann" },
                        "message": { "chat": { "id": 42, "first_name": "Ann" } },
                        "data": "weekly_goals"
                    }
                }
            ]
        })))
        .mount(&server)
        .await;
    // Later polls must acknowledge both updates.
    Mock::given(method("POST"))
        .and(path(method_path("getUpdates")))
        .and(body_partial_json(json!({ "offset": 502 })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "ok": true, "result": [] }))
                .set_delay(Duration::from_millis(50)),
        )
        .mount(&server)
        .await;

    let adapter = adapter(&server);
    let (tx, mut rx) = mpsc::channel(8);
    let poll = tokio::spawn(async move { adapter.run(tx).await });

    let first = rx.recv().await.unwrap();
    assert_eq!(first.chat_id, "42");
    assert_eq!(first.display_name, "Ann");
    assert_eq!(
        first.kind,
        InboundKind::Command {
            name: "start".to_owned(),
            args: String::new()
        }
    );
    let second = rx.recv().await.unwrap();
    assert_eq!(
        second.kind,
        InboundKind::Callback {
            token: "weekly_goals".to_owned(),
            callback_id: "cb-1".to_owned()
        }
    );

    // Give the adapter time to issue the follow-up poll.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(rx.try_recv().is_err());
    poll.abort();
}

#[tokio::test]
async fn empty_token_refuses_to_poll() {
    let server = MockServer::start().await;
    let adapter = TelegramAdapter::new(&TelegramConfig {
        api_base_url: server.uri(),
        ..TelegramConfig::default()
    })
    .unwrap();
    let (tx, _rx) = mpsc::channel(1);
    assert!(adapter.run(tx).await.is_err());
}

#[tokio::test]
async fn restarted_poll_resumes_after_acknowledged_updates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(method_path("getUpdates")))
        .and(body_partial_json(json!({ "offset": 0 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": [{
                "update_id": 700,
                "message": {
                    "chat": { "id": 42, "first_name": "Ann" },
                    "text": "hello"
                }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    // The acknowledging poll fails once, ending the first run.
    Mock::given(method("POST"))
        .and(path(method_path("getUpdates")))
        .and(body_partial_json(json!({ "offset": 701 })))
        .respond_with(ResponseTemplate::new(502).set_body_json(json!({
            "ok": false,
            "description": "Bad Gateway"
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(method_path("getUpdates")))
        .and(body_partial_json(json!({ "offset": 701 })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "ok": true, "result": [] }))
                .set_delay(Duration::from_millis(50)),
        )
        .mount(&server)
        .await;

    let adapter = std::sync::Arc::new(adapter(&server));
    let (tx, mut rx) = mpsc::channel(8);

    let err = adapter.run(tx.clone()).await.unwrap_err();
    assert!(err.to_string().contains("Bad Gateway"));
    assert_eq!(rx.recv().await.unwrap().kind, InboundKind::Text { text: "hello".to_owned() });

    let restarted = std::sync::Arc::clone(&adapter);
    let poll = tokio::spawn(async move { restarted.run(tx).await });
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(rx.try_recv().is_err());
    poll.abort();
}
