//! Channel message types.

use serde::{Deserialize, Serialize};

/// What an inbound event carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// A slash command with its arguments, e.g. `/cmd ls -la`.
    Command { name: String, args: Vec<String> },
    /// An inline keyboard button press.
    ButtonPress { token: String },
    /// Plain text that is not a command.
    Text(String),
}

/// Inbound event from the chat platform.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Platform message ID.
    pub id: String,
    /// Stable numeric identity used for authorization decisions.
    pub sender_id: i64,
    /// Mutable human handle, if the platform supplied one.
    pub sender_name: Option<String>,
    /// Chat the reply should go to.
    pub chat_id: i64,
    pub payload: Payload,
    /// Milliseconds since epoch.
    pub timestamp: i64,
}

impl InboundMessage {
    pub fn new(id: impl Into<String>, sender_id: i64, chat_id: i64, payload: Payload) -> Self {
        Self {
            id: id.into(),
            sender_id,
            sender_name: None,
            chat_id,
            payload,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn with_sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = Some(name.into());
        self
    }

    /// Parse raw text into a command or plain-text payload.
    pub fn parse_payload(text: &str) -> Payload {
        let trimmed = text.trim();
        if let Some(rest) = trimmed.strip_prefix('/') {
            let mut parts = rest.split_whitespace();
            if let Some(name) = parts.next() {
                // Strip the @botname suffix Telegram appends in groups.
                let name = name.split('@').next().unwrap_or(name).to_string();
                return Payload::Command {
                    name,
                    args: parts.map(str::to_string).collect(),
                };
            }
        }
        Payload::Text(trimmed.to_string())
    }
}

/// Message level for formatting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageLevel {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl MessageLevel {
    /// Get emoji representation for the message level
    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Info => "ℹ️",
            Self::Success => "✅",
            Self::Warning => "⚠️",
            Self::Error => "❌",
        }
    }
}

/// Whether the transport should interpret markup in the text.
///
/// `MarkdownV2` text must already be escaped by the sender; the transport
/// rejects malformed entities rather than fixing them up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormattingMode {
    #[default]
    Plain,
    MarkdownV2,
}

/// Outbound message to the chat platform.
///
/// Must already fit within the transport's single-message cap; long payloads
/// are pre-split by the sender.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub chat_id: i64,
    pub text: String,
    pub level: MessageLevel,
    pub formatting: FormattingMode,
    /// Inline keyboard rows of `(label, token)` pairs; the token comes back
    /// as a `ButtonPress` payload.
    pub buttons: Vec<Vec<(String, String)>>,
}

impl OutboundMessage {
    pub fn new(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            level: MessageLevel::Info,
            formatting: FormattingMode::Plain,
            buttons: Vec::new(),
        }
    }

    pub fn with_level(mut self, level: MessageLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_formatting(mut self, formatting: FormattingMode) -> Self {
        self.formatting = formatting;
        self
    }

    /// Append one keyboard row.
    pub fn with_button_row(mut self, buttons: &[(&str, &str)]) -> Self {
        self.buttons.push(
            buttons
                .iter()
                .map(|(label, token)| (label.to_string(), token.to_string()))
                .collect(),
        );
        self
    }

    pub fn warning(chat_id: i64, text: impl Into<String>) -> Self {
        Self::new(chat_id, text).with_level(MessageLevel::Warning)
    }

    pub fn error(chat_id: i64, text: impl Into<String>) -> Self {
        Self::new(chat_id, text).with_level(MessageLevel::Error)
    }
}
