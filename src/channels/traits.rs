use async_trait::async_trait;
use tokio::sync::mpsc;

/// One button of an inline keyboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    /// Label shown to the user.
    pub text: String,
    /// Callback token delivered back when pressed.
    pub token: String,
}

impl InlineButton {
    #[must_use]
    pub fn new(text: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            token: token.into(),
        }
    }
}

/// Inline keyboard attached to an outbound message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<InlineButton>>,
}

impl Keyboard {
    /// Keyboard with a single row of buttons.
    #[must_use]
    pub fn row(buttons: Vec<InlineButton>) -> Self {
        Self {
            rows: vec![buttons],
        }
    }

    /// Every callback token on the keyboard, row by row.
    #[must_use]
    pub fn tokens(&self) -> Vec<&str> {
        self.rows
            .iter()
            .flatten()
            .map(|b| b.token.as_str())
            .collect()
    }
}

/// What an inbound message carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundKind {
    /// `/name args`.
    Command { name: String, args: String },
    /// A pressed inline button.
    Callback { token: String, callback_id: String },
    /// Any other text.
    Text { text: String },
}

/// Inbound message received from an external communication channel.
#[derive(Debug, Clone)]
pub struct ChannelInboundMessage {
    pub channel: String,
    /// Conversation the reply goes to.
    pub chat_id: String,
    /// Person who sent it (differs from `chat_id` in group chats).
    pub sender: String,
    pub display_name: String,
    pub kind: InboundKind,
}

/// Outbound message sent back to a communication channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOutboundMessage {
    pub chat_id: String,
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

/// Channel adapter contract. New channels only need to implement this trait.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Stable channel identifier (e.g. `telegram`).
    fn id(&self) -> &'static str;

    /// Send a message to a chat.
    async fn send(&self, message: ChannelOutboundMessage) -> anyhow::Result<()>;

    /// Start receiving inbound messages and forwarding them to the runtime.
    async fn run(&self, inbound_tx: mpsc::Sender<ChannelInboundMessage>) -> anyhow::Result<()>;

    /// Acknowledge a pressed button so the client stops its spinner.
    async fn answer_callback(&self, _callback_id: &str) -> anyhow::Result<()> {
        Ok(())
    }

    /// Best-effort health probe.
    async fn health_check(&self) -> anyhow::Result<bool>;
}
