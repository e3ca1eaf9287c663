pub mod embedding_provider;
pub mod embedding_service;

// Re-export for convenience
pub use embedding_provider::{EmbeddingProvider, MockProvider, OllamaProvider};
pub use embedding_service::{BackfillReport, EmbeddingService};
