//! The suggestion pipeline: embed -> rank -> assemble context.

pub mod assembler;
pub mod ranker;

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::models::internal::{ConversationGroup, ReplyMetadata, SuggestionReply};
use crate::services::embedding_provider::EmbeddingProvider;
use crate::storage::message_store::MessageStore;
use assembler::ConversationAssembler;
use ranker::{RankerError, SearchOptions, SimilarityRanker};

#[derive(Debug, Error)]
pub enum SuggestError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("embedding failed: {0}")]
    EmbeddingFailure(String),
    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("vector index unavailable: {0}")]
    IndexUnavailable(String),
    #[error("{0} timed out")]
    Timeout(&'static str),
}

impl From<RankerError> for SuggestError {
    fn from(err: RankerError) -> Self {
        match err {
            RankerError::DimensionMismatch { expected, actual } => {
                SuggestError::DimensionMismatch { expected, actual }
            }
            RankerError::Unavailable(e) => SuggestError::IndexUnavailable(e.to_string()),
            RankerError::Timeout => SuggestError::Timeout("index query"),
        }
    }
}

/// Tuning knobs for the end-to-end pipeline; all values come from [`Config`].
///
/// [`Config`]: crate::config::Config
#[derive(Debug, Clone)]
pub struct SuggestionSettings {
    /// How many ranked suggestions a request returns.
    pub suggestion_count: usize,
    /// How many unfiltered neighbors feed the similar-conversation context.
    pub context_candidates: usize,
    /// How many conversation groups the context keeps.
    pub conversation_limit: usize,
    pub embed_timeout: Duration,
}

/// End-to-end "suggest a reply" orchestration. Stateless per call: concurrent
/// requests share only the read-only provider, ranker, and store handles.
pub struct SuggestionService {
    provider: Arc<dyn EmbeddingProvider>,
    ranker: Arc<SimilarityRanker>,
    assembler: ConversationAssembler,
    store: Arc<dyn MessageStore>,
    settings: SuggestionSettings,
}

impl SuggestionService {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        ranker: Arc<SimilarityRanker>,
        store: Arc<dyn MessageStore>,
        settings: SuggestionSettings,
    ) -> Self {
        Self {
            provider,
            ranker,
            assembler: ConversationAssembler::new(store.clone()),
            store,
            settings,
        }
    }

    pub fn assembler(&self) -> &ConversationAssembler {
        &self.assembler
    }

    /// Produce ranked reply suggestions for an incoming message.
    ///
    /// Validation happens before any I/O. An embedding failure is fatal to the
    /// call; the similar-conversation context is supplementary and degrades to
    /// an empty list when its data pull fails. An empty suggestion list is a
    /// successful result, distinct from any error.
    pub async fn get_suggestions(
        &self,
        message_text: &str,
        conversation_id: Option<&str>,
    ) -> Result<SuggestionReply, SuggestError> {
        let text = message_text.trim();
        if text.is_empty() {
            return Err(SuggestError::InvalidInput(
                "message text must not be empty".to_string(),
            ));
        }

        let query_vector = timeout(
            self.settings.embed_timeout,
            self.provider.generate_embedding(text),
        )
        .await
        .map_err(|_| SuggestError::Timeout("embedding"))?
        .map_err(|e| SuggestError::EmbeddingFailure(e.to_string()))?;

        let options = SearchOptions {
            top_k: self.settings.suggestion_count,
            ..SearchOptions::default()
        };
        let suggestions = self
            .ranker
            .find_similar_business_responses(&query_vector, &options)
            .await?;

        let similar_conversations = match self.similar_conversations(&query_vector).await {
            Ok(groups) => groups,
            Err(e) => {
                warn!("Similar-conversation context failed, degrading to empty: {}", e);
                Vec::new()
            }
        };

        debug!(
            conversation_id = conversation_id.unwrap_or("-"),
            suggestions = suggestions.len(),
            conversations = similar_conversations.len(),
            "Assembled suggestion reply"
        );

        let metadata = ReplyMetadata {
            processed_at: chrono::Utc::now(),
            similarity_count: suggestions.len(),
            conversation_count: similar_conversations.len(),
        };

        Ok(SuggestionReply {
            suggestions,
            similar_conversations,
            metadata,
        })
    }

    /// Broader, unfiltered candidate pull shaped into conversation groups.
    /// Supplementary display context only; not a conversation-level ranking.
    async fn similar_conversations(
        &self,
        query_vector: &[f32],
    ) -> Result<Vec<ConversationGroup>, anyhow::Error> {
        let options = SearchOptions {
            top_k: self.settings.context_candidates,
            ..SearchOptions::default()
        };
        let candidates = self.ranker.find_similar(query_vector, &options).await?;

        let mut conversation_ids: Vec<String> = Vec::new();
        for candidate in &candidates {
            if let Some(id) = candidate.metadata["conversation_id"].as_str() {
                if !conversation_ids.iter().any(|c| c == id) {
                    conversation_ids.push(id.to_string());
                }
            }
        }
        conversation_ids.truncate(self.settings.conversation_limit);

        let mut flat = Vec::new();
        for id in &conversation_ids {
            flat.extend(self.store.get_messages_by_conversation(id).await?);
        }

        Ok(self
            .assembler
            .group_into_conversations(flat, self.settings.conversation_limit))
    }
}
