//! Gmail item source — fetches unread messages over the Gmail REST API.
//!
//! Uses a pre-issued bearer token; token acquisition and refresh happen
//! outside this process. Messages are fetched in raw RFC 822 form and
//! decoded with mail-parser, so the classifier always sees plain text.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use regex::Regex;
use secrecy::ExposeSecret;
use serde::Deserialize;

use crate::channels::{Item, ItemRef, ItemSource};
use crate::config::GmailConfig;
use crate::error::SourceError;

const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";

/// Request timeout for Gmail API calls.
const GMAIL_TIMEOUT: Duration = Duration::from_secs(30);

/// Gmail REST source.
pub struct GmailSource {
    client: reqwest::Client,
    config: GmailConfig,
    base_url: String,
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    messages: Vec<MessageId>,
}

#[derive(Deserialize)]
struct MessageId {
    id: String,
}

#[derive(Deserialize)]
struct RawMessage {
    id: String,
    raw: String,
    #[serde(rename = "internalDate")]
    internal_date: Option<String>,
}

impl GmailSource {
    pub fn new(config: GmailConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            base_url: GMAIL_API_BASE.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/users/{}/{path}", self.base_url, self.config.user)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<T, SourceError> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(self.config.access_token.expose_secret())
            .timeout(GMAIL_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SourceError::Timeout {
                        timeout: GMAIL_TIMEOUT,
                    }
                } else {
                    SourceError::Transport(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SourceError::Api {
                status: status.as_u16(),
                body,
            });
        }

        resp.json().await.map_err(|e| SourceError::Transport(e.to_string()))
    }
}

#[async_trait]
impl ItemSource for GmailSource {
    fn name(&self) -> &str {
        "gmail"
    }

    async fn list_unprocessed(&self, max: usize) -> Result<Vec<ItemRef>, SourceError> {
        let url = format!(
            "{}?maxResults={max}&q=is:unread",
            self.url("messages")
        );
        let list: ListResponse = self.get_json(&url).await?;
        Ok(list
            .messages
            .into_iter()
            .map(|m| ItemRef { id: m.id })
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Item, SourceError> {
        let url = format!("{}?format=raw", self.url(&format!("messages/{id}")));
        let message: RawMessage = self.get_json(&url).await?;
        parse_raw_message(&message.id, &message.raw, message.internal_date.as_deref())
    }
}

/// Decode a base64url-encoded RFC 822 message into an `Item`.
fn parse_raw_message(
    id: &str,
    raw_b64: &str,
    internal_date_ms: Option<&str>,
) -> Result<Item, SourceError> {
    let bytes = decode_base64url(raw_b64).map_err(|reason| SourceError::Decode {
        id: id.to_string(),
        reason,
    })?;

    let parsed = mail_parser::MessageParser::default()
        .parse(&bytes)
        .ok_or_else(|| SourceError::Decode {
            id: id.to_string(),
            reason: "unparseable RFC 822 message".into(),
        })?;

    let raw_text = String::from_utf8_lossy(&bytes);
    let sender = extract_sender(&parsed, &raw_text);
    let subject = parsed.subject().map(str::to_string);
    let body = parsed
        .body_text(0)
        .map(|t| t.to_string())
        .unwrap_or_default();

    let received_at = internal_date_ms
        .and_then(|ms| ms.parse::<i64>().ok())
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or_else(Utc::now);

    Ok(Item {
        id: id.to_string(),
        sender,
        subject,
        body,
        permalink: Some(format!(
            "https://mail.google.com/mail/u/0/#inbox/{id}"
        )),
        received_at,
    })
}

/// Gmail emits URL-safe base64, with or without padding.
fn decode_base64url(raw: &str) -> Result<Vec<u8>, String> {
    URL_SAFE
        .decode(raw)
        .or_else(|_| URL_SAFE_NO_PAD.decode(raw))
        .map_err(|e| format!("base64 decode failed: {e}"))
}

/// Extract the sender address from a parsed message, falling back to a
/// regex over the raw From header line for nonstandard formats.
fn extract_sender(parsed: &mail_parser::Message, raw_text: &str) -> Option<String> {
    if let Some(address) = parsed
        .from()
        .and_then(|addr| addr.first())
        .and_then(|a| a.address())
    {
        return Some(address.to_string());
    }

    static FROM_LINE: OnceLock<Regex> = OnceLock::new();
    let re = FROM_LINE.get_or_init(|| {
        Regex::new(r"(?mi)^From:(?:.*<([^<>\s]+@[^<>\s]+)>|.*?([^\s<>]+@[^\s<>]+))").unwrap()
    });

    re.captures(raw_text)
        .and_then(|c| c.get(1).or_else(|| c.get(2)))
        .map(|m| m.as_str().to_string())
}
