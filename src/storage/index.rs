//! Vector index boundary: the trait the suggestion core queries, plus an
//! in-memory implementation used by tests.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index unavailable: {0}")]
    Unavailable(String),
    #[error("index API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("collection not found: {0}")]
    CollectionNotFound(String),
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// One stored (vector, document, metadata) triple, keyed by an opaque id.
#[derive(Debug, Clone)]
pub struct IndexRecord {
    pub id: String,
    pub embedding: Vec<f32>,
    pub document: String,
    pub metadata: Value,
}

/// A nearest-neighbor hit as returned by the index, distance-not-similarity.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub id: String,
    /// Cosine distance in [0,2]; the ranker converts to similarity.
    pub distance: f32,
    pub document: Option<String>,
    pub metadata: Value,
}

/// Closed set of metadata predicates. Free-form filter objects are not
/// accepted at this boundary so a malformed filter cannot be silently ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MetadataFilter {
    #[default]
    None,
    /// Only records embedded from messages the business itself sent.
    BusinessOnly,
}

impl MetadataFilter {
    /// Chroma `where` clause for this predicate.
    pub fn where_clause(&self) -> Option<Value> {
        match self {
            MetadataFilter::None => None,
            MetadataFilter::BusinessOnly => Some(json!({ "is_business_response": true })),
        }
    }

    pub fn matches(&self, metadata: &Value) -> bool {
        match self {
            MetadataFilter::None => true,
            MetadataFilter::BusinessOnly => {
                metadata["is_business_response"].as_bool() == Some(true)
            }
        }
    }
}

/// Persistent nearest-neighbor store. All methods are safe to call from
/// concurrent requests; the suggestion path only ever reads.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Idempotent create-or-get. Safe to call concurrently.
    async fn ensure_collection(&self, name: &str, dimension: usize) -> Result<(), IndexError>;

    /// Store or overwrite one record. Re-embedding the same id is idempotent.
    async fn upsert(&self, collection: &str, record: IndexRecord) -> Result<(), IndexError>;

    /// Nearest neighbors by cosine distance, closest first. May return fewer
    /// than `top_k`; an empty collection yields an empty vec, not an error.
    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<ScoredPoint>, IndexError>;

    async fn ping(&self) -> Result<(), IndexError>;
}

/// In-memory index with exact cosine scoring. Test double for [`VectorIndex`];
/// numerically consistent with `cosine_similarity`.
#[derive(Default)]
pub struct InMemoryIndex {
    records: Mutex<Vec<IndexRecord>>,
    dimension: Mutex<Option<usize>>,
    pub query_count: AtomicUsize,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<IndexRecord>) -> Self {
        let index = Self::new();
        *index.records.lock().unwrap() = records;
        index
    }

    pub fn queries(&self) -> usize {
        self.query_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn ensure_collection(&self, _name: &str, dimension: usize) -> Result<(), IndexError> {
        let mut dim = self.dimension.lock().unwrap();
        if dim.is_none() {
            *dim = Some(dimension);
        }
        Ok(())
    }

    async fn upsert(&self, _collection: &str, record: IndexRecord) -> Result<(), IndexError> {
        if let Some(expected) = *self.dimension.lock().unwrap() {
            if record.embedding.len() != expected {
                return Err(IndexError::DimensionMismatch {
                    expected,
                    actual: record.embedding.len(),
                });
            }
        }
        let mut records = self.records.lock().unwrap();
        if let Some(existing) = records.iter_mut().find(|r| r.id == record.id) {
            *existing = record;
        } else {
            records.push(record);
        }
        Ok(())
    }

    async fn query(
        &self,
        _collection: &str,
        embedding: &[f32],
        top_k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<ScoredPoint>, IndexError> {
        self.query_count.fetch_add(1, Ordering::SeqCst);

        let records = self.records.lock().unwrap();
        let mut hits = Vec::new();
        for record in records.iter().filter(|r| filter.matches(&r.metadata)) {
            let similarity = crate::suggest::ranker::cosine_similarity(embedding, &record.embedding)
                .map_err(|_| IndexError::DimensionMismatch {
                    expected: record.embedding.len(),
                    actual: embedding.len(),
                })?;
            hits.push(ScoredPoint {
                id: record.id.clone(),
                distance: 1.0 - similarity,
                document: Some(record.document.clone()),
                metadata: record.metadata.clone(),
            });
        }

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn ping(&self) -> Result<(), IndexError> {
        Ok(())
    }
}
