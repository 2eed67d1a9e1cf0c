//! Inbound messages and the suppliers that produce them.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{GuardError, Result};

/// A message observed by the host platform, classified once and discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Raw sender identifier as the platform reports it.
    pub sender: String,
    /// Message text.
    pub body: String,
    /// Epoch millis when the platform observed the message.
    #[serde(default, rename = "timestamp")]
    pub observed_at: Option<u64>,
}

impl InboundMessage {
    pub fn new(sender: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            body: body.into(),
            observed_at: None,
        }
    }

    pub fn observed_at(mut self, at: u64) -> Self {
        self.observed_at = Some(at);
        self
    }
}

/// Supplier of inbound messages, implemented by the platform adapter.
#[async_trait]
pub trait MessageSupplier: Send + Sync {
    /// Messages observed after `cursor` (epoch millis), or all available
    /// messages when no cursor has been recorded yet.
    ///
    /// The cursor is exclusive at millisecond resolution: a message stamped
    /// with exactly the cursor value is treated as already classified, even
    /// if the platform delivers it in a later scan.
    async fn messages_since(&self, cursor: Option<u64>) -> Result<Vec<InboundMessage>>;
}

fn newer_than(message: &InboundMessage, cursor: Option<u64>) -> bool {
    match (cursor, message.observed_at) {
        (None, _) => true,
        (Some(cursor), Some(at)) => at > cursor,
        // Untimestamped messages are only delivered on the first scan.
        (Some(_), None) => false,
    }
}

/// In-process supplier, fed by [`MemoryInbox::push`].
#[derive(Debug, Default)]
pub struct MemoryInbox {
    messages: Mutex<Vec<InboundMessage>>,
}

impl MemoryInbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, message: InboundMessage) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
    }
}

#[async_trait]
impl MessageSupplier for MemoryInbox {
    async fn messages_since(&self, cursor: Option<u64>) -> Result<Vec<InboundMessage>> {
        let messages = self.messages.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(messages
            .iter()
            .filter(|m| newer_than(m, cursor))
            .cloned()
            .collect())
    }
}

/// Supplier reading a JSON array of `{sender, body, timestamp?}` records
/// from disk on every scan. A missing file is an empty inbox.
#[derive(Debug, Clone)]
pub struct JsonInbox {
    path: PathBuf,
}

impl JsonInbox {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl MessageSupplier for JsonInbox {
    async fn messages_since(&self, cursor: Option<u64>) -> Result<Vec<InboundMessage>> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(GuardError::Inbox(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let messages: Vec<InboundMessage> = serde_json::from_slice(&raw).map_err(|e| {
            GuardError::Inbox(format!("invalid inbox file {}: {}", self.path.display(), e))
        })?;

        Ok(messages
            .into_iter()
            .filter(|m| newer_than(m, cursor))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_inbox_filters_by_cursor() {
        let inbox = MemoryInbox::new();
        inbox.push(InboundMessage::new("0788000001", "old").observed_at(100));
        inbox.push(InboundMessage::new("0788000002", "new").observed_at(200));
        inbox.push(InboundMessage::new("0788000003", "undated"));

        assert_eq!(inbox.messages_since(None).await.unwrap().len(), 3);

        let newer = inbox.messages_since(Some(100)).await.unwrap();
        assert_eq!(newer.len(), 1);
        assert_eq!(newer[0].body, "new");
    }

    #[tokio::test]
    async fn test_cursor_is_exclusive() {
        let inbox = MemoryInbox::new();
        inbox.push(InboundMessage::new("0788000001", "first").observed_at(100));
        // Same millisecond, arriving after the cursor was recorded.
        inbox.push(InboundMessage::new("0788000002", "late").observed_at(100));
        inbox.push(InboundMessage::new("0788000003", "next").observed_at(101));

        let newer = inbox.messages_since(Some(100)).await.unwrap();
        assert_eq!(newer.len(), 1);
        assert_eq!(newer[0].body, "next");
    }

    #[tokio::test]
    async fn test_json_inbox() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inbox.json");
        std::fs::write(
            &path,
            r#"[
                {"sender": "+250788000001", "body": "hello", "timestamp": 1700000000000},
                {"sender": "MTN", "body": "no timestamp"}
            ]"#,
        )
        .unwrap();

        let inbox = JsonInbox::new(&path);
        let all = inbox.messages_since(None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].observed_at, Some(1_700_000_000_000));
        assert_eq!(all[1].observed_at, None);

        assert!(inbox
            .messages_since(Some(1_700_000_000_000))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_json_inbox_missing_and_invalid() {
        let dir = tempfile::tempdir().unwrap();

        let missing = JsonInbox::new(dir.path().join("absent.json"));
        assert!(missing.messages_since(None).await.unwrap().is_empty());

        let path = dir.path().join("broken.json");
        std::fs::write(&path, "not json").unwrap();
        let broken = JsonInbox::new(&path);
        assert!(matches!(
            broken.messages_since(None).await,
            Err(GuardError::Inbox(_))
        ));
    }
}
