//! External collaborators: item sources and notification sinks.
//!
//! Adapters here are pure I/O — they fetch items and deliver notifications.
//! Classification and orchestration live in `classifier` and `pipeline`.

pub mod gmail;
pub mod telegram;

pub use gmail::GmailSource;
pub use telegram::TelegramSink;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{SinkError, SourceError};

/// The unit of work flowing through a pipeline — an email or a question.
///
/// Immutable once fetched; owned by the orchestrator for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Unique ID (source-native or generated UUID).
    pub id: String,
    /// Sender identifier, when the source has one (email address).
    pub sender: Option<String>,
    /// Subject line or title.
    pub subject: Option<String>,
    /// Body text, decoded from any transport encoding.
    pub body: String,
    /// Link back to the item at its source, for notifications.
    pub permalink: Option<String>,
    /// When the item was received.
    pub received_at: DateTime<Utc>,
}

impl Item {
    /// Wrap a raw question as an item for the Q&A pipeline.
    pub fn question(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender: None,
            subject: None,
            body: text.into(),
            permalink: None,
            received_at: Utc::now(),
        }
    }
}

/// Reference to an unprocessed item, as listed by a source.
#[derive(Debug, Clone)]
pub struct ItemRef {
    pub id: String,
}

/// Source of items to triage (e.g. a mailbox).
///
/// Implementations must supply decoded sender, subject, and body before an
/// item reaches the classifier.
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// Source name (e.g. "gmail").
    fn name(&self) -> &str;

    /// List up to `max` unprocessed item references, newest first.
    async fn list_unprocessed(&self, max: usize) -> Result<Vec<ItemRef>, SourceError>;

    /// Fetch and decode one item by id.
    async fn get(&self, id: &str) -> Result<Item, SourceError>;
}

/// Destination for the pipeline's final notification.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Sink name (e.g. "telegram").
    fn name(&self) -> &str;

    /// Deliver a titled message. Errors are reported by the caller but do
    /// not abort the pipeline run that produced the notification.
    async fn send(&self, title: &str, body: &str) -> Result<(), SinkError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_item_has_body_and_no_sender() {
        let item = Item::question("Why is the sky blue?");
        assert_eq!(item.body, "Why is the sky blue?");
        assert!(item.sender.is_none());
        assert!(item.subject.is_none());
        assert!(item.permalink.is_none());
        assert!(!item.id.is_empty());
    }

    #[test]
    fn question_items_get_distinct_ids() {
        let a = Item::question("one");
        let b = Item::question("one");
        assert_ne!(a.id, b.id);
    }
}
