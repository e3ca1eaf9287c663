//! Embed-and-index pipeline: the write side of the vector index.
//!
//! Suggestions never write; everything here runs either on webhook ingestion
//! (best-effort, a failed embedding never loses the message) or during the
//! backfill migration over historical messages.

use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{AcquireError, Semaphore};
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

use crate::models::internal::Message;
use crate::services::embedding_provider::{EmbeddingProvider, ProviderError};
use crate::storage::index::{IndexError, IndexRecord, VectorIndex};
use crate::storage::message_store::{MessageStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("provider error: {0}")]
    Provider(String),
    #[error("no embeddings returned")]
    NoEmbeddings,
    #[error("index error: {0}")]
    Index(#[from] IndexError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("semaphore error: {0}")]
    Semaphore(String),
    #[error("max retries exceeded")]
    MaxRetriesExceeded,
}

impl From<AcquireError> for EmbeddingError {
    fn from(err: AcquireError) -> Self {
        EmbeddingError::Semaphore(err.to_string())
    }
}

/// Outcome of one backfill pass.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct BackfillReport {
    pub indexed: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct EmbeddingService {
    provider: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    collection: String,
    dimension: usize,
    semaphore: Arc<Semaphore>,
    max_retries: u32,
}

impl EmbeddingService {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        collection: String,
        dimension: usize,
        max_retries: u32,
    ) -> Self {
        Self {
            provider,
            index,
            collection,
            dimension,
            semaphore: Arc::new(Semaphore::new(5)),
            max_retries,
        }
    }

    /// Generate an embedding using the configured provider. Concurrency is
    /// bounded so a backfill cannot flood the embedding process.
    pub async fn generate_embedding(&self, content: &str) -> Result<Vec<f32>, EmbeddingError> {
        let _permit = self.semaphore.acquire().await?;

        match self.provider.generate_embedding(content).await {
            Ok(embedding) => Ok(embedding),
            Err(ProviderError::NoEmbeddings) => Err(EmbeddingError::NoEmbeddings),
            Err(e) => Err(EmbeddingError::Provider(e.to_string())),
        }
    }

    /// Generate an embedding with bounded exponential backoff. `NoEmbeddings`
    /// is not retried; it signals a model problem, not a transient failure.
    pub async fn generate_embedding_with_retry(
        &self,
        content: &str,
        max_retries: u32,
    ) -> Result<Vec<f32>, EmbeddingError> {
        for attempt in 0..max_retries {
            match self.generate_embedding(content).await {
                Ok(embedding) => return Ok(embedding),
                Err(EmbeddingError::NoEmbeddings) => return Err(EmbeddingError::NoEmbeddings),
                Err(e) => {
                    debug!("Embedding attempt {} failed: {}", attempt + 1, e);
                    if attempt < max_retries - 1 {
                        sleep(Duration::from_millis(100 * 2_u64.pow(attempt))).await;
                    }
                }
            }
        }

        Err(EmbeddingError::MaxRetriesExceeded)
    }

    /// Embed one message and upsert it into the index. Idempotent per
    /// `(conversation_id, message_id)`; re-embedding overwrites.
    pub async fn process_message(
        &self,
        message: &Message,
        is_business_conversation: bool,
    ) -> Result<String, EmbeddingError> {
        debug!(
            "Generating embedding for message {} in {}",
            message.id, message.conversation_id
        );

        let embedding = self
            .generate_embedding_with_retry(&message.content, self.max_retries)
            .await?;

        if embedding.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        // Chroma only accepts flat key-value metadata with simple types.
        let preview: String = message.content.chars().take(100).collect();
        let metadata = json!({
            "conversation_id": message.conversation_id,
            "message_id": message.id,
            "is_business_response": message.is_from_business,
            "is_business_conversation": is_business_conversation,
            "timestamp_ms": message.timestamp.timestamp_millis(),
            "content_length": message.content.len(),
            "content_preview": preview,
        });

        // Message ids are only unique per conversation; the index key is the
        // composite.
        let embedding_id = format!("{}:{}", message.conversation_id, message.id);

        self.index
            .ensure_collection(&self.collection, self.dimension)
            .await?;

        self.index
            .upsert(
                &self.collection,
                IndexRecord {
                    id: embedding_id.clone(),
                    embedding,
                    document: message.content.clone(),
                    metadata,
                },
            )
            .await?;

        info!("Stored embedding {}", embedding_id);

        Ok(embedding_id)
    }

    /// One-time/periodic migration: embed every stored message that has text.
    /// Individual failures are counted and logged, never abort the pass.
    pub async fn backfill(&self, store: &dyn MessageStore) -> Result<BackfillReport, EmbeddingError> {
        let mut report = BackfillReport::default();

        for conversation_id in store.conversation_ids().await? {
            let messages = store.get_messages_by_conversation(&conversation_id).await?;
            let is_business_conversation = messages.iter().any(|m| m.is_from_business);

            let tasks = messages.iter().map(|message| async move {
                if message.content.trim().is_empty() {
                    return None;
                }
                Some(self.process_message(message, is_business_conversation).await)
            });

            for outcome in join_all(tasks).await {
                match outcome {
                    None => report.skipped += 1,
                    Some(Ok(_)) => report.indexed += 1,
                    Some(Err(e)) => {
                        warn!("Backfill embedding failed in {}: {}", conversation_id, e);
                        report.failed += 1;
                    }
                }
            }
        }

        info!(
            "Backfill finished: {} indexed, {} skipped, {} failed",
            report.indexed, report.skipped, report.failed
        );

        Ok(report)
    }
}
