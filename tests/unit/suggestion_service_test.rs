use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use reply_relay::services::embedding_provider::{EmbeddingProvider, MockProvider, ProviderError};
use reply_relay::storage::index::InMemoryIndex;
use reply_relay::storage::message_store::{InMemoryMessageStore, MessageStore};
use reply_relay::suggest::ranker::SimilarityRanker;
use reply_relay::suggest::{SuggestError, SuggestionService, SuggestionSettings};

use crate::{message, record_with_similarity, unit_query, FailingStore};

fn settings() -> SuggestionSettings {
    SuggestionSettings {
        suggestion_count: 3,
        context_candidates: 10,
        conversation_limit: 3,
        embed_timeout: Duration::from_secs(1),
    }
}

fn service_with(
    provider: Arc<dyn EmbeddingProvider>,
    index: Arc<InMemoryIndex>,
    store: Arc<dyn MessageStore>,
) -> SuggestionService {
    let ranker = Arc::new(SimilarityRanker::new(
        index,
        "business_replies".to_string(),
        2,
        0.7,
        Duration::from_secs(1),
    ));
    SuggestionService::new(provider, ranker, store, settings())
}

/// Provider that never answers within a request timeout.
struct SlowProvider;

#[async_trait]
impl EmbeddingProvider for SlowProvider {
    async fn generate_embedding(&self, _content: &str) -> Result<Vec<f32>, ProviderError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(unit_query())
    }
}

#[tokio::test]
async fn empty_input_is_rejected_before_any_io() {
    let provider = Arc::new(MockProvider::new_success(unit_query()));
    let index = Arc::new(InMemoryIndex::new());
    let service = service_with(
        provider.clone(),
        index.clone(),
        Arc::new(InMemoryMessageStore::new()),
    );

    let result = service.get_suggestions("   ", Some("chat1")).await;

    assert!(matches!(result, Err(SuggestError::InvalidInput(_))));
    assert_eq!(provider.calls(), 0);
    assert_eq!(index.queries(), 0);
}

#[tokio::test]
async fn embedding_failure_is_fatal() {
    let provider = Arc::new(MockProvider::new_error(ProviderError::Http(
        "connection refused".to_string(),
    )));
    let index = Arc::new(InMemoryIndex::with_records(vec![record_with_similarity(
        "m1", 0.9, true, "c1",
    )]));
    let service = service_with(provider, index.clone(), Arc::new(InMemoryMessageStore::new()));

    let result = service.get_suggestions("when do you open?", None).await;

    assert!(matches!(result, Err(SuggestError::EmbeddingFailure(_))));
    // No partial suggestion list was fabricated from the index.
    assert_eq!(index.queries(), 0);
}

#[tokio::test]
async fn embedding_timeout_surfaces_as_timeout() {
    let mut settings = settings();
    settings.embed_timeout = Duration::from_millis(20);

    let ranker = Arc::new(SimilarityRanker::new(
        Arc::new(InMemoryIndex::new()),
        "business_replies".to_string(),
        2,
        0.7,
        Duration::from_secs(1),
    ));
    let service = SuggestionService::new(
        Arc::new(SlowProvider),
        ranker,
        Arc::new(InMemoryMessageStore::new()),
        settings,
    );

    let result = service.get_suggestions("hello", None).await;

    assert!(matches!(result, Err(SuggestError::Timeout(_))));
}

#[tokio::test]
async fn context_failure_degrades_to_empty_list() {
    let provider = Arc::new(MockProvider::new_success(unit_query()));
    let index = Arc::new(InMemoryIndex::with_records(vec![record_with_similarity(
        "m1", 0.9, true, "c1",
    )]));
    let service = service_with(provider, index, Arc::new(FailingStore));

    let reply = service.get_suggestions("where is my order?", None).await.unwrap();

    assert_eq!(reply.suggestions.len(), 1);
    assert!(reply.similar_conversations.is_empty());
    assert_eq!(reply.metadata.conversation_count, 0);
}

#[tokio::test]
async fn happy_path_returns_suggestions_and_context() {
    let provider = Arc::new(MockProvider::new_success(unit_query()));
    let index = Arc::new(InMemoryIndex::with_records(vec![
        record_with_similarity("m1", 0.9, true, "c1"),
        record_with_similarity("m2", 0.8, true, "c2"),
        record_with_similarity("m3", 0.2, true, "c3"),
    ]));
    let store = Arc::new(InMemoryMessageStore::with_messages(vec![
        message("m1", "c1", 0, false),
        message("m2", "c1", 1, true),
        message("m3", "c2", 2, false),
    ]));
    let service = service_with(provider, index, store);

    let reply = service.get_suggestions("do you deliver?", Some("c9")).await.unwrap();

    assert_eq!(reply.suggestions.len(), 2);
    assert!(reply.suggestions[0].similarity >= reply.suggestions[1].similarity);
    assert_eq!(reply.metadata.similarity_count, 2);

    assert_eq!(reply.similar_conversations.len(), 2);
    assert_eq!(reply.similar_conversations[0].conversation_id, "c1");
    assert_eq!(reply.similar_conversations[0].messages.len(), 2);
}

#[tokio::test]
async fn empty_index_is_success_with_no_suggestions() {
    let provider = Arc::new(MockProvider::new_success(unit_query()));
    let service = service_with(
        provider,
        Arc::new(InMemoryIndex::new()),
        Arc::new(InMemoryMessageStore::new()),
    );

    let reply = service.get_suggestions("hello", None).await.unwrap();

    assert!(reply.suggestions.is_empty());
    assert_eq!(reply.metadata.similarity_count, 0);
}
