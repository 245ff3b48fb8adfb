use crate::channels::traits::{
    ChannelAdapter, ChannelInboundMessage, ChannelOutboundMessage, InboundKind, Keyboard,
};
use crate::config::TelegramConfig;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// Telegram adapter using Bot API long polling.
pub struct TelegramAdapter {
    base_url: String,
    bot_token: String,
    poll_timeout_secs: u64,
    client: reqwest::Client,
    /// Next `getUpdates` offset, kept across `run` restarts.
    offset: AtomicI64,
}

impl TelegramAdapter {
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be built.
    pub fn new(config: &TelegramConfig) -> anyhow::Result<Self> {
        // The client timeout must outlive the long poll.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs + 15))
            .build()?;
        Ok(Self {
            base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            bot_token: config.bot_token.clone(),
            poll_timeout_secs: config.poll_timeout_secs,
            client,
            offset: AtomicI64::new(0),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.base_url, self.bot_token)
    }

    async fn call(&self, method: &str, body: Value) -> anyhow::Result<Value> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let payload: Value = response.json().await.unwrap_or(Value::Null);
        let ok = payload.get("ok").and_then(Value::as_bool).unwrap_or(false);
        if !status.is_success() || !ok {
            let description = payload
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("no description");
            anyhow::bail!("telegram {method} failed ({status}): {description}");
        }
        Ok(payload.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Convert one `getUpdates` entry into an inbound message.
    ///
    /// Returns `None` for update types the bot does not handle.
    #[must_use]
    pub fn parse_update(update: &Value) -> Option<ChannelInboundMessage> {
        if let Some(query) = update.get("callback_query") {
            let callback_id = query.get("id").and_then(Value::as_str)?.to_owned();
            let token = query.get("data").and_then(Value::as_str)?.to_owned();
            let chat = query.get("message").and_then(|m| m.get("chat"))?;
            return Some(ChannelInboundMessage {
                channel: "telegram".to_owned(),
                chat_id: id_text(chat.get("id")?)?,
                sender: query.get("from").and_then(|f| f.get("id")).and_then(id_text)?,
                display_name: display_name(chat, query.get("from")),
                kind: InboundKind::Callback { token, callback_id },
            });
        }

        let message = update.get("message")?;
        let chat = message.get("chat")?;
        let text = message.get("text").and_then(Value::as_str)?.trim();
        if text.is_empty() {
            return None;
        }
        let from = message.get("from");
        let chat_id = id_text(chat.get("id")?)?;
        let sender = from
            .and_then(|f| f.get("id"))
            .and_then(id_text)
            .unwrap_or_else(|| chat_id.clone());

        Some(ChannelInboundMessage {
            channel: "telegram".to_owned(),
            chat_id,
            sender,
            display_name: display_name(chat, from),
            kind: parse_text(text),
        })
    }
}

fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn display_name(chat: &Value, from: Option<&Value>) -> String {
    let field = |v: Option<&Value>, key: &str| {
        v.and_then(|v| v.get(key))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
    };
    field(Some(chat), "first_name")
        .or_else(|| field(from, "first_name"))
        .or_else(|| field(Some(chat), "title"))
        .unwrap_or_default()
}

/// Split `/name@bot args` into a command, anything else is free text.
fn parse_text(text: &str) -> InboundKind {
    let Some(rest) = text.strip_prefix('/') else {
        return InboundKind::Text {
            text: text.to_owned(),
        };
    };
    let (head, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let name = head.split('@').next().unwrap_or_default().to_ascii_lowercase();
    if name.is_empty() {
        return InboundKind::Text {
            text: text.to_owned(),
        };
    }
    InboundKind::Command {
        name,
        args: args.trim().to_owned(),
    }
}

fn chat_id_value(chat_id: &str) -> Value {
    chat_id
        .parse::<i64>()
        .map_or_else(|_| json!(chat_id), |id| json!(id))
}

fn keyboard_markup(keyboard: &Keyboard) -> Value {
    let rows: Vec<Vec<Value>> = keyboard
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|b| json!({ "text": b.text, "callback_data": b.token }))
                .collect()
        })
        .collect();
    json!({ "inline_keyboard": rows })
}

#[async_trait]
impl ChannelAdapter for TelegramAdapter {
    fn id(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, message: ChannelOutboundMessage) -> anyhow::Result<()> {
        let mut body = json!({
            "chat_id": chat_id_value(&message.chat_id),
            "text": message.text,
        });
        if let Some(keyboard) = &message.keyboard {
            body["reply_markup"] = keyboard_markup(keyboard);
        }
        self.call("sendMessage", body).await?;
        Ok(())
    }

    async fn run(&self, inbound_tx: mpsc::Sender<ChannelInboundMessage>) -> anyhow::Result<()> {
        if self.bot_token.trim().is_empty() {
            anyhow::bail!("telegram bot token is empty");
        }

        loop {
            let updates = self
                .call(
                    "getUpdates",
                    json!({
                        "offset": self.offset.load(Ordering::SeqCst),
                        "timeout": self.poll_timeout_secs,
                        "allowed_updates": ["message", "callback_query"],
                    }),
                )
                .await?;

            let Some(updates) = updates.as_array() else {
                continue;
            };
            for update in updates {
                if let Some(update_id) = update.get("update_id").and_then(Value::as_i64) {
                    self.offset.fetch_max(update_id + 1, Ordering::SeqCst);
                }
                let Some(message) = Self::parse_update(update) else {
                    tracing::debug!("ignoring unsupported telegram update");
                    continue;
                };
                if inbound_tx.send(message).await.is_err() {
                    // Runtime shut down.
                    return Ok(());
                }
            }
        }
    }

    async fn answer_callback(&self, callback_id: &str) -> anyhow::Result<()> {
        self.call(
            "answerCallbackQuery",
            json!({ "callback_query_id": callback_id }),
        )
        .await?;
        Ok(())
    }

    async fn health_check(&self) -> anyhow::Result<bool> {
        let me = self.call("getMe", json!({})).await?;
        Ok(me.get("is_bot").and_then(Value::as_bool).unwrap_or(false))
    }
}
