use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reply_relay::{
    api::{relay, routes},
    config::Config,
    services::embedding_provider::OllamaProvider,
    services::embedding_service::EmbeddingService,
    storage::{self, chroma_client::ChromaClient, message_store::SqliteMessageStore, VectorIndex},
    suggest::{ranker::SimilarityRanker, SuggestionService, SuggestionSettings},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reply_relay=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load config
    let config = Config::load()?;

    // Raw message store (SQLite)
    let pool = storage::init_db(&config.database_url, config.max_connections).await?;
    let store = Arc::new(SqliteMessageStore::new(pool));

    // Vector index (Chroma)
    let chroma: Arc<dyn VectorIndex> = Arc::new(ChromaClient::new(config.chroma_url.clone()));
    match chroma.ping().await {
        Ok(()) => tracing::info!("Chroma reachable at {}", config.chroma_url),
        Err(e) => tracing::warn!(
            "Chroma not reachable at {}: {}. Suggestions will fail until it is up.",
            config.chroma_url,
            e
        ),
    }

    // Embedding provider (Ollama)
    let provider = Arc::new(OllamaProvider::new(
        config.ollama_url.clone(),
        config.embedding_model.clone(),
    ));

    // Write side: embed + upsert pipeline for ingest and backfill
    let indexer = Arc::new(EmbeddingService::new(
        provider.clone(),
        chroma.clone(),
        config.index_collection.clone(),
        config.embedding_dimension,
        config.embed_max_retries,
    ));

    // Read side: the suggestion pipeline
    let ranker = Arc::new(SimilarityRanker::new(
        chroma,
        config.index_collection.clone(),
        config.embedding_dimension,
        config.similarity_threshold,
        config.query_timeout(),
    ));

    let suggester = Arc::new(SuggestionService::new(
        provider,
        ranker,
        store.clone(),
        SuggestionSettings {
            suggestion_count: config.suggestion_count,
            context_candidates: config.context_candidates,
            conversation_limit: config.conversation_limit,
            embed_timeout: config.embed_timeout(),
        },
    ));

    // Fan-out channel for connected UI clients
    let (events, _) = broadcast::channel(relay::EVENT_BUFFER);

    let port = config.server_port;
    let chroma_url = config.chroma_url.clone();
    let ollama_url = config.ollama_url.clone();

    let state = routes::AppState {
        config: Arc::new(RwLock::new(config)),
        store,
        suggester,
        indexer,
        events,
    };

    let app = routes::create_router(state);

    let addr: SocketAddr = ([127, 0, 0, 1], port).into();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🚀 Server listening on {}", addr);
    tracing::info!("📊 Chroma URL: {}", chroma_url);
    tracing::info!("🤖 Ollama URL: {}", ollama_url);

    axum::serve(listener, app).await?;

    Ok(())
}
