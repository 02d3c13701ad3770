//! Telegram Bot API channel.
//!
//! Sends messages and receives updates via long-polling. Both plain
//! messages and `callback_query` events from inline keyboards arrive on
//! the same stream, in Telegram's delivery order.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures::Stream;
use reqwest::Client;
use serde::Deserialize;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::traits::Channel;
use super::types::{FormattingMode, InboundMessage, MessageLevel, OutboundMessage, Payload};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org/bot";
/// Default timeout for Telegram API calls (seconds)
const API_TIMEOUT_SECS: u64 = 30;

/// Telegram channel configuration
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// Bot token from @BotFather
    pub bot_token: String,
    /// Polling timeout in seconds (default: 30)
    pub polling_timeout: u32,
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            polling_timeout: 30,
        }
    }

    pub fn with_polling_timeout(mut self, timeout: u32) -> Self {
        self.polling_timeout = timeout;
        self
    }
}

/// An inline keyboard attached to an outbound message.
///
/// Rows of `(label, token)` pairs; the token comes back verbatim in the
/// matching `callback_query`.
#[derive(Debug, Clone, Default)]
pub struct InlineKeyboard {
    pub rows: Vec<Vec<(String, String)>>,
}

impl InlineKeyboard {
    pub fn row(mut self, buttons: &[(&str, &str)]) -> Self {
        self.rows.push(
            buttons
                .iter()
                .map(|(label, token)| (label.to_string(), token.to_string()))
                .collect(),
        );
        self
    }

    fn to_json(&self) -> serde_json::Value {
        let rows: Vec<Vec<serde_json::Value>> = self
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|(label, token)| {
                        serde_json::json!({ "text": label, "callback_data": token })
                    })
                    .collect()
            })
            .collect();
        serde_json::json!({ "inline_keyboard": rows })
    }
}

/// Telegram channel implementation
pub struct TelegramChannel {
    config: TelegramConfig,
    client: Client,
    /// Whether polling is active
    polling_active: Arc<AtomicBool>,
    /// Last update ID for long-polling
    last_update_id: Arc<AtomicI64>,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            client: Client::new(),
            polling_active: Arc::new(AtomicBool::new(false)),
            last_update_id: Arc::new(AtomicI64::new(0)),
        }
    }

    pub fn with_token(bot_token: impl Into<String>) -> Self {
        Self::new(TelegramConfig::new(bot_token))
    }

    /// Get the API URL for a method
    fn api_url(&self, method: &str) -> String {
        format!("{}{}/{}", TELEGRAM_API_BASE, self.config.bot_token, method)
    }

    /// Prefix non-info messages with their level emoji.
    fn format_text(message: &OutboundMessage) -> String {
        match message.level {
            MessageLevel::Info => message.text.clone(),
            level => format!("{} {}", level.emoji(), message.text),
        }
    }

    /// Send message via Telegram API
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: Option<&str>,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<()> {
        let url = self.api_url("sendMessage");

        let mut params = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });

        if let Some(mode) = parse_mode {
            params["parse_mode"] = serde_json::Value::String(mode.to_string());
        }
        if let Some(keyboard) = keyboard {
            params["reply_markup"] = keyboard.to_json();
        }

        let response = self
            .client
            .post(&url)
            .json(&params)
            .timeout(std::time::Duration::from_secs(API_TIMEOUT_SECS))
            .send()
            .await?;

        if response.status().is_success() {
            let api_response: TelegramResponse<TelegramMessageResponse> = response.json().await?;
            if api_response.ok {
                Ok(())
            } else {
                Err(anyhow!(
                    "Telegram API error: {}",
                    api_response.description.unwrap_or_default()
                ))
            }
        } else {
            let error = response.text().await.unwrap_or_default();
            Err(anyhow!("Telegram HTTP error: {}", error))
        }
    }

    /// Acknowledge a callback query so the client stops its spinner.
    async fn answer_callback_query(&self, callback_query_id: &str) -> Result<()> {
        let url = self.api_url("answerCallbackQuery");
        let params = serde_json::json!({ "callback_query_id": callback_query_id });

        let response = self
            .client
            .post(&url)
            .json(&params)
            .timeout(std::time::Duration::from_secs(API_TIMEOUT_SECS))
            .send()
            .await?;

        let body: TelegramResponse<bool> = response.json().await?;
        if body.ok {
            Ok(())
        } else {
            Err(anyhow!(
                "Telegram API error: {}",
                body.description.unwrap_or_default()
            ))
        }
    }

    /// Poll for updates using long-polling
    async fn poll_updates(&self) -> Result<Vec<TelegramUpdate>> {
        let url = self.api_url("getUpdates");

        let offset = self.last_update_id.load(Ordering::SeqCst);
        let params = serde_json::json!({
            "offset": if offset > 0 { offset + 1 } else { 0 },
            "timeout": self.config.polling_timeout,
            "allowed_updates": ["message", "callback_query"],
        });

        let response = self
            .client
            .post(&url)
            .json(&params)
            .timeout(std::time::Duration::from_secs(
                self.config.polling_timeout as u64 + 10,
            ))
            .send()
            .await?;

        let body: TelegramResponse<Vec<TelegramUpdate>> = response.json().await?;

        if !body.ok {
            return Err(anyhow!(
                "Telegram API error: {:?}",
                body.description.unwrap_or_default()
            ));
        }

        let updates = body.result.unwrap_or_default();

        if let Some(last) = updates.last() {
            self.last_update_id.store(last.update_id, Ordering::SeqCst);
        }

        Ok(updates)
    }

    /// Convert Telegram update to InboundMessage
    async fn convert_update(&self, update: TelegramUpdate) -> Option<InboundMessage> {
        if let Some(callback) = update.callback_query {
            if let Err(e) = self.answer_callback_query(&callback.id).await {
                warn!("Failed to answer callback query: {}", e);
            }
            let chat_id = callback.message.as_ref().map(|m| m.chat.id)?;
            let token = callback.data?;
            let from = callback.from;
            let mut inbound = InboundMessage::new(
                format!("cb_{}", callback.id),
                from.id,
                chat_id,
                Payload::ButtonPress { token },
            );
            if let Some(name) = Self::display_name(&from) {
                inbound = inbound.with_sender_name(name);
            }
            return Some(inbound);
        }

        let message = update.message?;
        let from = message.from?;
        let text = message.text?;

        let mut inbound = InboundMessage::new(
            format!("tg_{}", message.message_id),
            from.id,
            message.chat.id,
            InboundMessage::parse_payload(&text),
        );
        if let Some(name) = Self::display_name(&from) {
            inbound = inbound.with_sender_name(name);
        }
        Some(inbound)
    }

    fn display_name(user: &TelegramUser) -> Option<String> {
        user.username
            .clone()
            .or_else(|| {
                Some(format!(
                    "{}{}",
                    user.first_name.as_deref().unwrap_or(""),
                    user.last_name
                        .as_ref()
                        .map(|l| format!(" {}", l))
                        .unwrap_or_default()
                ))
            })
            .filter(|s| !s.is_empty())
    }

    /// Test the connection by calling getMe
    pub async fn test_connection(&self) -> Result<TelegramUser> {
        let url = self.api_url("getMe");
        let response = self
            .client
            .get(&url)
            .timeout(std::time::Duration::from_secs(API_TIMEOUT_SECS))
            .send()
            .await?;

        let body: TelegramResponse<TelegramUser> = response.json().await?;

        if body.ok {
            body.result
                .ok_or_else(|| anyhow!("Telegram returned ok but no result"))
        } else {
            Err(anyhow!(
                "Telegram API error: {}",
                body.description.unwrap_or_default()
            ))
        }
    }

    pub fn stop_polling(&self) {
        self.polling_active.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn is_configured(&self) -> bool {
        !self.config.bot_token.is_empty()
    }

    async fn send(&self, message: OutboundMessage) -> Result<()> {
        let parse_mode = match message.formatting {
            FormattingMode::MarkdownV2 => Some("MarkdownV2"),
            FormattingMode::Plain => None,
        };
        let keyboard = if message.buttons.is_empty() {
            None
        } else {
            Some(InlineKeyboard {
                rows: message.buttons.clone(),
            })
        };
        let text = Self::format_text(&message);
        self.send_message(message.chat_id, &text, parse_mode, keyboard.as_ref())
            .await
    }

    fn start_receiving(&self) -> Option<Pin<Box<dyn Stream<Item = InboundMessage> + Send>>> {
        if !self.is_configured() {
            return None;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let polling_active = self.polling_active.clone();
        let last_update_id = self.last_update_id.clone();
        let config = self.config.clone();
        let client = self.client.clone();

        tokio::spawn(async move {
            polling_active.store(true, Ordering::SeqCst);
            info!("Starting Telegram polling");

            let channel = TelegramChannel {
                config,
                client,
                polling_active: polling_active.clone(),
                last_update_id,
            };

            while polling_active.load(Ordering::SeqCst) {
                match channel.poll_updates().await {
                    Ok(updates) => {
                        for update in updates {
                            if let Some(message) = channel.convert_update(update).await {
                                debug!(
                                    "Received Telegram event {} from {}",
                                    message.id, message.sender_id
                                );
                                if tx.send(message).is_err() {
                                    warn!("Message receiver dropped, stopping polling");
                                    polling_active.store(false, Ordering::SeqCst);
                                    break;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        error!("Telegram polling error: {}", e);
                        // Back off on error
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    }
                }
            }

            info!("Telegram polling stopped");
        });

        Some(Box::pin(
            tokio_stream::wrappers::UnboundedReceiverStream::new(rx),
        ))
    }
}

// ============================================================================
// Telegram API Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    update_id: i64,
    message: Option<TelegramMessage>,
    callback_query: Option<TelegramCallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    message_id: i64,
    from: Option<TelegramUser>,
    chat: TelegramChat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramCallbackQuery {
    id: String,
    from: TelegramUser,
    message: Option<TelegramMessage>,
    data: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramUser {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TelegramMessageResponse {
    #[allow(dead_code)]
    message_id: i64,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telegram_config_builder() {
        let config = TelegramConfig::new("test-token").with_polling_timeout(60);
        assert_eq!(config.bot_token, "test-token");
        assert_eq!(config.polling_timeout, 60);
    }

    #[test]
    fn test_telegram_channel_is_configured() {
        let channel = TelegramChannel::with_token("test-token");
        assert!(channel.is_configured());

        let empty = TelegramChannel::with_token("");
        assert!(!empty.is_configured());
    }

    #[test]
    fn test_format_text_levels() {
        let warning = OutboundMessage::warning(1, "high load");
        assert_eq!(TelegramChannel::format_text(&warning), "⚠️ high load");

        let error = OutboundMessage::error(1, "boom");
        assert_eq!(TelegramChannel::format_text(&error), "❌ boom");

        let info = OutboundMessage::new(1, "plain");
        assert_eq!(TelegramChannel::format_text(&info), "plain");
    }

    #[test]
    fn test_api_url() {
        let channel = TelegramChannel::with_token("123:ABC");
        assert_eq!(
            channel.api_url("sendMessage"),
            "https://api.telegram.org/bot123:ABC/sendMessage"
        );
    }

    #[test]
    fn test_inline_keyboard_json() {
        let keyboard = InlineKeyboard::default()
            .row(&[("Status", "status"), ("Processes", "processes")])
            .row(&[("Help", "help")]);

        let json = keyboard.to_json();
        let rows = json["inline_keyboard"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0]["text"], "Status");
        assert_eq!(rows[0][1]["callback_data"], "processes");
        assert_eq!(rows[1][0]["callback_data"], "help");
    }

    #[tokio::test]
    async fn test_convert_update_text_command() {
        let channel = TelegramChannel::with_token("test");

        let update = TelegramUpdate {
            update_id: 12345,
            message: Some(TelegramMessage {
                message_id: 100,
                from: Some(TelegramUser {
                    id: 42,
                    is_bot: false,
                    first_name: Some("John".to_string()),
                    last_name: Some("Doe".to_string()),
                    username: Some("johndoe".to_string()),
                }),
                chat: TelegramChat { id: 999 },
                text: Some("/cmd uptime".to_string()),
            }),
            callback_query: None,
        };

        let inbound = channel.convert_update(update).await.unwrap();
        assert_eq!(inbound.id, "tg_100");
        assert_eq!(inbound.sender_id, 42);
        assert_eq!(inbound.chat_id, 999);
        assert_eq!(inbound.sender_name, Some("johndoe".to_string()));
        assert_eq!(
            inbound.payload,
            Payload::Command {
                name: "cmd".to_string(),
                args: vec!["uptime".to_string()],
            }
        );
    }

    #[tokio::test]
    async fn test_convert_update_no_username_falls_back_to_full_name() {
        let channel = TelegramChannel::with_token("test");

        let update = TelegramUpdate {
            update_id: 12345,
            message: Some(TelegramMessage {
                message_id: 100,
                from: Some(TelegramUser {
                    id: 42,
                    is_bot: false,
                    first_name: Some("John".to_string()),
                    last_name: Some("Doe".to_string()),
                    username: None,
                }),
                chat: TelegramChat { id: 999 },
                text: Some("hello".to_string()),
            }),
            callback_query: None,
        };

        let inbound = channel.convert_update(update).await.unwrap();
        assert_eq!(inbound.sender_name, Some("John Doe".to_string()));
        assert_eq!(inbound.payload, Payload::Text("hello".to_string()));
    }

    #[tokio::test]
    async fn test_convert_update_empty() {
        let channel = TelegramChannel::with_token("test");

        let update = TelegramUpdate {
            update_id: 12345,
            message: None,
            callback_query: None,
        };

        assert!(channel.convert_update(update).await.is_none());
    }

    #[tokio::test]
    async fn test_convert_update_no_text() {
        let channel = TelegramChannel::with_token("test");

        let update = TelegramUpdate {
            update_id: 12345,
            message: Some(TelegramMessage {
                message_id: 100,
                from: Some(TelegramUser {
                    id: 42,
                    is_bot: false,
                    first_name: Some("John".to_string()),
                    last_name: None,
                    username: None,
                }),
                chat: TelegramChat { id: 999 },
                text: None,
            }),
            callback_query: None,
        };

        assert!(channel.convert_update(update).await.is_none());
    }

    #[test]
    fn test_callback_query_deserializes() {
        let raw = serde_json::json!({
            "update_id": 7,
            "callback_query": {
                "id": "abc",
                "from": { "id": 42, "is_bot": false, "username": "johndoe" },
                "message": {
                    "message_id": 55,
                    "chat": { "id": 999 },
                },
                "data": "status"
            }
        });

        let update: TelegramUpdate = serde_json::from_value(raw).unwrap();
        let callback = update.callback_query.unwrap();
        assert_eq!(callback.id, "abc");
        assert_eq!(callback.data.as_deref(), Some("status"));
        assert_eq!(callback.message.unwrap().chat.id, 999);
    }
}
