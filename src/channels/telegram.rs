//! Telegram notification sink — posts via the Bot API.
//!
//! Sends Markdown first and falls back to plain text when Telegram rejects
//! the formatting. Messages over the API limit are split on line boundaries.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tracing::warn;

use crate::channels::NotificationSink;
use crate::config::TelegramConfig;
use crate::error::SinkError;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Request timeout for Bot API calls.
const TELEGRAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Telegram Bot API sink.
pub struct TelegramSink {
    client: reqwest::Client,
    config: TelegramConfig,
}

impl TelegramSink {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "https://api.telegram.org/bot{}/{method}",
            self.config.bot_token.expose_secret()
        )
    }

    /// Send a single message chunk (≤4096 chars), Markdown-first with
    /// plain-text fallback.
    async fn send_chunk(&self, text: &str) -> Result<(), SinkError> {
        let markdown_body = serde_json::json!({
            "chat_id": self.config.chat_id,
            "text": text,
            "parse_mode": "Markdown",
        });

        let markdown_resp = self
            .client
            .post(self.api_url("sendMessage"))
            .timeout(TELEGRAM_TIMEOUT)
            .json(&markdown_body)
            .send()
            .await
            .map_err(|e| SinkError::Send(e.to_string()))?;

        if markdown_resp.status().is_success() {
            return Ok(());
        }

        let markdown_status = markdown_resp.status();
        warn!(
            status = ?markdown_status,
            "Telegram sendMessage with Markdown failed; retrying without parse_mode"
        );

        let plain_body = serde_json::json!({
            "chat_id": self.config.chat_id,
            "text": text,
        });
        let plain_resp = self
            .client
            .post(self.api_url("sendMessage"))
            .timeout(TELEGRAM_TIMEOUT)
            .json(&plain_body)
            .send()
            .await
            .map_err(|e| SinkError::Send(e.to_string()))?;

        let plain_status = plain_resp.status();
        if !plain_status.is_success() {
            let body = plain_resp.text().await.unwrap_or_default();
            return Err(SinkError::Api {
                status: plain_status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

#[async_trait]
impl NotificationSink for TelegramSink {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, title: &str, body: &str) -> Result<(), SinkError> {
        let message = format!("*{title}*\n\n{body}");
        for chunk in split_message(&message, TELEGRAM_MAX_MESSAGE_LENGTH) {
            self.send_chunk(&chunk).await?;
        }
        Ok(())
    }
}

/// Split a message into chunks within `max_len`, preferring newline and
/// space boundaries.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let boundary = floor_char_boundary(remaining, max_len);
        let window = &remaining[..boundary];
        let split_at = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .unwrap_or(boundary);

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { boundary } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

/// Largest index ≤ `max` that falls on a char boundary.
fn floor_char_boundary(text: &str, max: usize) -> usize {
    let mut idx = max.min(text.len());
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}
