//! Similarity ranking over the vector index.
//!
//! Score convention: the index returns cosine distance in [0,2] (the Chroma
//! collection is created with `hnsw:space = cosine`), and every distance is
//! converted here with `similarity = 1 - distance`. `cosine_similarity` below
//! follows the same convention, so local scores and index scores compare
//! directly.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OnceCell;
use tokio::time::timeout;

use crate::models::internal::SuggestionResult;
use crate::storage::index::{IndexError, MetadataFilter, VectorIndex};

#[derive(Debug, Error)]
pub enum RankerError {
    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("vector index unavailable: {0}")]
    Unavailable(#[from] IndexError),
    #[error("vector index query timed out")]
    Timeout,
}

/// Per-query knobs. Defaults match a plain top-3 lookup with the configured
/// threshold and no metadata filter.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub top_k: usize,
    pub filter: MetadataFilter,
    /// Overrides the ranker's default threshold when set.
    pub min_similarity: Option<f32>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            top_k: 3,
            filter: MetadataFilter::None,
            min_similarity: None,
        }
    }
}

pub struct SimilarityRanker {
    index: Arc<dyn VectorIndex>,
    collection: String,
    dimension: usize,
    default_threshold: f32,
    query_timeout: Duration,
    init: OnceCell<()>,
}

impl SimilarityRanker {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        collection: String,
        dimension: usize,
        default_threshold: f32,
        query_timeout: Duration,
    ) -> Self {
        Self {
            index,
            collection,
            dimension,
            default_threshold,
            query_timeout,
            init: OnceCell::new(),
        }
    }

    /// Lazy create-or-get of the backing collection. Runs at most once per
    /// ranker; concurrent callers wait on the same initialization.
    async fn ensure_ready(&self) -> Result<(), RankerError> {
        self.init
            .get_or_try_init(|| async {
                self.index
                    .ensure_collection(&self.collection, self.dimension)
                    .await
            })
            .await?;
        Ok(())
    }

    /// Nearest neighbors of `query_vector`, threshold-filtered and sorted by
    /// descending similarity. Ties keep the index's original order (stable
    /// sort). An empty index yields an empty vec. Pure read; never retries.
    pub async fn find_similar(
        &self,
        query_vector: &[f32],
        options: &SearchOptions,
    ) -> Result<Vec<SuggestionResult>, RankerError> {
        if query_vector.len() != self.dimension {
            return Err(RankerError::DimensionMismatch {
                expected: self.dimension,
                actual: query_vector.len(),
            });
        }

        self.ensure_ready().await?;

        let points = timeout(
            self.query_timeout,
            self.index
                .query(&self.collection, query_vector, options.top_k, &options.filter),
        )
        .await
        .map_err(|_| RankerError::Timeout)??;

        let threshold = options.min_similarity.unwrap_or(self.default_threshold);

        let mut results: Vec<SuggestionResult> = points
            .into_iter()
            .map(|p| SuggestionResult {
                document: p.document.unwrap_or_default(),
                similarity: 1.0 - p.distance,
                metadata: p.metadata,
            })
            .filter(|r| r.similarity >= threshold)
            .collect();

        results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));

        Ok(results)
    }

    /// `find_similar` restricted to replies the business itself sent. Customer
    /// text is never suggested back as a reply.
    pub async fn find_similar_business_responses(
        &self,
        query_vector: &[f32],
        options: &SearchOptions,
    ) -> Result<Vec<SuggestionResult>, RankerError> {
        let options = SearchOptions {
            filter: MetadataFilter::BusinessOnly,
            ..options.clone()
        };
        self.find_similar(query_vector, &options).await
    }
}

/// Dot product over magnitudes. Returns exactly `0.0` (never NaN) when either
/// vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, RankerError> {
    if a.len() != b.len() {
        return Err(RankerError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}
