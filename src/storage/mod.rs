pub mod chroma_client;
pub mod db;
pub mod index;
pub mod message_store;

pub use chroma_client::ChromaClient;
pub use db::init_db;
pub use index::{IndexError, IndexRecord, MetadataFilter, ScoredPoint, VectorIndex};
pub use message_store::{MessageStore, SqliteMessageStore, StoreError};
