//! reply-relay - similarity-ranked reply suggestions for a WhatsApp business
//! inbox, plus the thin relay that delivers them to connected UI clients.

pub mod api;
pub mod config;
pub mod models;
pub mod services;
pub mod storage;
pub mod suggest;

// Re-export main types for convenience
pub use crate::api::routes::{create_router, AppState};
pub use crate::config::Config;
pub use crate::models::internal::{ConversationGroup, Message, SuggestionReply, SuggestionResult};
pub use crate::services::embedding_provider::{EmbeddingProvider, OllamaProvider};
pub use crate::services::embedding_service::EmbeddingService;
pub use crate::storage::chroma_client::ChromaClient;
pub use crate::storage::db::init_db;
pub use crate::storage::index::{MetadataFilter, VectorIndex};
pub use crate::storage::message_store::{MessageStore, SqliteMessageStore};
pub use crate::suggest::ranker::{cosine_similarity, SearchOptions, SimilarityRanker};
pub use crate::suggest::{SuggestError, SuggestionService, SuggestionSettings};
