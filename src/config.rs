use serde::Deserialize;
use std::time::Duration;
use validator::Validate;

/// Main configuration for the reply relay.
#[derive(Debug, Deserialize, Validate, Clone)]
pub struct Config {
    /// HTTP server port
    #[validate(range(min = 1024, max = 65535))]
    pub server_port: u16,

    /// Message store URL (sqlx / SQLite)
    pub database_url: String,

    /// Maximum database connections
    #[validate(range(min = 1, max = 100))]
    pub max_connections: u32,

    /// Chroma base URL
    pub chroma_url: String,

    /// Ollama base URL
    pub ollama_url: String,

    /// Embedding model name
    pub embedding_model: String,

    /// Vector dimensionality the index is configured for; queries and writes
    /// with any other length are rejected
    #[validate(range(min = 1))]
    pub embedding_dimension: usize,

    /// Chroma collection holding message embeddings
    pub index_collection: String,

    /// Default minimum similarity for returned suggestions
    #[validate(range(min = 0.0, max = 1.0))]
    pub similarity_threshold: f32,

    /// Suggestions returned per request
    #[validate(range(min = 1))]
    pub suggestion_count: usize,

    /// Unfiltered neighbors pulled to build similar-conversation context
    #[validate(range(min = 1))]
    pub context_candidates: usize,

    /// Conversation groups kept in the context
    #[validate(range(min = 1))]
    pub conversation_limit: usize,

    /// Messages either side of a target in a context window request
    pub context_window: usize,

    /// Bounded timeout for one embedding call
    #[validate(range(min = 100))]
    pub embed_timeout_ms: u64,

    /// Bounded timeout for one index query
    #[validate(range(min = 100))]
    pub query_timeout_ms: u64,

    /// Retries for ingest/backfill embedding (the suggestion path never
    /// retries)
    #[validate(range(min = 1, max = 10))]
    pub embed_max_retries: u32,

    /// Log level (e.g., info, debug, trace)
    pub log_level: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            // Core defaults
            .set_default("server_port", 8080)?
            .set_default("database_url", "sqlite://reply-relay.db")?
            .set_default("max_connections", 10)?
            .set_default("chroma_url", "http://localhost:8000")?
            .set_default("ollama_url", "http://localhost:11434")?
            .set_default("embedding_model", "nomic-embed-text:latest")?
            .set_default("embedding_dimension", 768)?
            .set_default("index_collection", "business_replies")?
            .set_default("similarity_threshold", 0.7)?
            .set_default("suggestion_count", 3)?
            .set_default("context_candidates", 10)?
            .set_default("conversation_limit", 3)?
            .set_default("context_window", 5)?
            .set_default("embed_timeout_ms", 10_000)?
            .set_default("query_timeout_ms", 5_000)?
            .set_default("embed_max_retries", 3)?
            .set_default("log_level", "info")?
            // Load from ~/.reply-relay/config.toml (if present)
            .add_source(
                config::File::with_name(&format!(
                    "{}/.reply-relay/config",
                    std::env::var("HOME").unwrap_or_else(|_| ".".to_string())
                ))
                .required(false),
            )
            // Environment overrides: REPLY__SERVER_PORT, REPLY__CHROMA_URL, etc.
            .add_source(config::Environment::with_prefix("REPLY").separator("__"))
            .build()?;

        let cfg: Config = settings.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    pub fn embed_timeout(&self) -> Duration {
        Duration::from_millis(self.embed_timeout_ms)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}
