//! Raw message storage. The suggestion core is a read-only consumer; writes
//! happen only on webhook ingestion and never mutate existing rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

use crate::models::internal::Message;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Insert a message. Duplicate `(id, conversation_id)` keys are ignored;
    /// messages are immutable once stored.
    async fn insert_message(&self, message: &Message) -> Result<(), StoreError>;

    /// All messages of one conversation, oldest first. Ties on timestamp keep
    /// insertion order.
    async fn get_messages_by_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<Message>, StoreError>;

    async fn find_message(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<Option<Message>, StoreError>;

    /// Distinct conversation ids in first-message order.
    async fn conversation_ids(&self) -> Result<Vec<String>, StoreError>;

    async fn count_messages(&self) -> Result<u64, StoreError>;
}

pub struct SqliteMessageStore {
    pool: SqlitePool,
}

impl SqliteMessageStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_message(row: &SqliteRow) -> Result<Message, sqlx::Error> {
    let timestamp_ms: i64 = row.try_get("timestamp_ms")?;
    Ok(Message {
        id: row.try_get("id")?,
        conversation_id: row.try_get("conversation_id")?,
        sender: row.try_get("sender")?,
        content: row.try_get("content")?,
        timestamp: DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        is_from_business: row.try_get::<i64, _>("is_from_business")? != 0,
        media_type: row.try_get("media_type")?,
        filename: row.try_get("filename")?,
    })
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn insert_message(&self, message: &Message) -> Result<(), StoreError> {
        if !message.has_displayable_content() {
            return Err(StoreError::InvalidMessage(
                "empty content without media".to_string(),
            ));
        }

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO messages
                (id, conversation_id, sender, content, timestamp_ms,
                 is_from_business, media_type, filename)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&message.id)
        .bind(&message.conversation_id)
        .bind(&message.sender)
        .bind(&message.content)
        .bind(message.timestamp.timestamp_millis())
        .bind(message.is_from_business as i64)
        .bind(&message.media_type)
        .bind(&message.filename)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_messages_by_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, conversation_id, sender, content, timestamp_ms,
                   is_from_business, media_type, filename
            FROM messages
            WHERE conversation_id = ?
            ORDER BY timestamp_ms ASC, rowid ASC
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row_to_message(row).map_err(StoreError::Db))
            .collect()
    }

    async fn find_message(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<Option<Message>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, conversation_id, sender, content, timestamp_ms,
                   is_from_business, media_type, filename
            FROM messages
            WHERE conversation_id = ? AND id = ?
            "#,
        )
        .bind(conversation_id)
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref()
            .map(row_to_message)
            .transpose()
            .map_err(StoreError::Db)
    }

    async fn conversation_ids(&self) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT conversation_id
            FROM messages
            GROUP BY conversation_id
            ORDER BY MIN(rowid) ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get("conversation_id").map_err(StoreError::Db))
            .collect()
    }

    async fn count_messages(&self) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM messages")
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.try_get("n")?;
        Ok(n as u64)
    }
}

/// In-memory store. Test double for [`MessageStore`]; preserves insertion
/// order within a conversation like the SQLite rowid tie-break does.
#[derive(Default)]
pub struct InMemoryMessageStore {
    messages: Mutex<Vec<Message>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_messages(messages: Vec<Message>) -> Self {
        Self {
            messages: Mutex::new(messages),
        }
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn insert_message(&self, message: &Message) -> Result<(), StoreError> {
        if !message.has_displayable_content() {
            return Err(StoreError::InvalidMessage(
                "empty content without media".to_string(),
            ));
        }
        let mut messages = self.messages.lock().unwrap();
        let duplicate = messages
            .iter()
            .any(|m| m.id == message.id && m.conversation_id == message.conversation_id);
        if !duplicate {
            messages.push(message.clone());
        }
        Ok(())
    }

    async fn get_messages_by_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<Message>, StoreError> {
        let messages = self.messages.lock().unwrap();
        let mut selected: Vec<Message> = messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps.
        selected.sort_by_key(|m| m.timestamp);
        Ok(selected)
    }

    async fn find_message(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<Option<Message>, StoreError> {
        let messages = self.messages.lock().unwrap();
        Ok(messages
            .iter()
            .find(|m| m.conversation_id == conversation_id && m.id == message_id)
            .cloned())
    }

    async fn conversation_ids(&self) -> Result<Vec<String>, StoreError> {
        let messages = self.messages.lock().unwrap();
        let mut seen: HashMap<String, ()> = HashMap::new();
        let mut ids = Vec::new();
        for m in messages.iter() {
            if seen.insert(m.conversation_id.clone(), ()).is_none() {
                ids.push(m.conversation_id.clone());
            }
        }
        Ok(ids)
    }

    async fn count_messages(&self) -> Result<u64, StoreError> {
        Ok(self.messages.lock().unwrap().len() as u64)
    }
}
