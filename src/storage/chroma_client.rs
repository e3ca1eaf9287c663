use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::storage::index::{IndexError, IndexRecord, MetadataFilter, ScoredPoint, VectorIndex};

#[derive(Debug, Serialize)]
struct ChromaUpsertRequest {
    ids: Vec<String>,
    embeddings: Vec<Vec<f32>>,
    metadatas: Option<Vec<Value>>,
    documents: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct ChromaQueryRequest {
    query_embeddings: Vec<Vec<f32>>,
    n_results: u32,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    where_clause: Option<Value>,
    include: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ChromaQueryResponse {
    ids: Vec<Vec<String>>,
    distances: Vec<Vec<f32>>,
    metadatas: Option<Vec<Vec<Value>>>,
    documents: Option<Vec<Vec<Option<String>>>>,
}

/// Rust-native ChromaDB client using HTTP API v2.
///
/// Collections are created with `hnsw:space = cosine`, so query distances are
/// cosine distances in [0,2]. The ranker's `similarity = 1 - distance`
/// conversion relies on this; do not change the space without changing it too.
pub struct ChromaClient {
    base_url: String,
    client: Client,
    tenant: String,
    database: String,
}

impl ChromaClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
            tenant: "default_tenant".to_string(),
            database: "default_database".to_string(),
        }
    }

    fn collections_url(&self) -> String {
        format!(
            "{}/api/v2/tenants/{}/databases/{}/collections",
            self.base_url, self.tenant, self.database
        )
    }

    fn collection_url(&self, collection_name: &str) -> String {
        format!(
            "{}/api/v2/tenants/{}/databases/{}/collections/{}",
            self.base_url, self.tenant, self.database, collection_name
        )
    }

    fn collection_operation_url(&self, collection_id: &str, operation: &str) -> String {
        format!(
            "{}/api/v2/tenants/{}/databases/{}/collections/{}/{}",
            self.base_url, self.tenant, self.database, collection_id, operation
        )
    }

    async fn create_collection(&self, name: &str, dimension: usize) -> Result<(), IndexError> {
        let url = self.collections_url();

        let body = json!({
            "name": name,
            "get_or_create": true,
            "metadata": {
                "hnsw:space": "cosine",
                "dimension": dimension
            }
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(connection_error)?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => {
                tracing::info!("Created collection {} with dimension {}", name, dimension);
                Ok(())
            }
            // A concurrent caller created the collection between the
            // existence check and this POST; it exists now, which is all
            // ensure_collection promises.
            StatusCode::CONFLICT => {
                tracing::debug!("Collection {} created concurrently", name);
                Ok(())
            }
            status => Err(api_error(status, response).await),
        }
    }

    /// Get collection ID by name.
    async fn get_collection_id(&self, name: &str) -> Result<String, IndexError> {
        let url = self.collection_url(name);

        let response = self.client.get(&url).send().await.map_err(connection_error)?;

        match response.status() {
            StatusCode::OK => {
                let collection: Value = response.json().await.map_err(connection_error)?;
                collection["id"]
                    .as_str()
                    .map(|s| s.to_string())
                    .ok_or_else(|| IndexError::CollectionNotFound(name.to_string()))
            }
            StatusCode::NOT_FOUND => Err(IndexError::CollectionNotFound(name.to_string())),
            status => Err(api_error(status, response).await),
        }
    }

    fn parse_query_results(&self, response: ChromaQueryResponse) -> Vec<ScoredPoint> {
        let mut results = Vec::new();

        if let Some(ids) = response.ids.first() {
            let distances = response.distances.first();
            let metadatas = response.metadatas.as_ref().and_then(|m| m.first());
            let documents = response.documents.as_ref().and_then(|d| d.first());

            for (idx, id) in ids.iter().enumerate() {
                let distance = distances
                    .and_then(|d| d.get(idx))
                    .copied()
                    .unwrap_or(0.0);
                let metadata = metadatas
                    .and_then(|m| m.get(idx))
                    .cloned()
                    .unwrap_or_else(|| json!({}));
                let document = documents.and_then(|d| d.get(idx)).cloned().flatten();

                results.push(ScoredPoint {
                    id: id.clone(),
                    distance,
                    document,
                    metadata,
                });
            }
        }

        results
    }
}

#[async_trait]
impl VectorIndex for ChromaClient {
    /// Ensure collection exists, create if not. Idempotent.
    async fn ensure_collection(&self, name: &str, dimension: usize) -> Result<(), IndexError> {
        let url = self.collections_url();

        let response = self.client.get(&url).send().await.map_err(connection_error)?;

        match response.status() {
            StatusCode::OK => {
                let collections: Vec<Value> =
                    response.json().await.map_err(connection_error)?;
                let exists = collections.iter().any(|c| c["name"] == name);

                if !exists {
                    tracing::info!("Creating Chroma collection: {}", name);
                    self.create_collection(name, dimension).await?;
                } else {
                    tracing::debug!("Collection {} already exists", name);
                }
                Ok(())
            }
            status => Err(api_error(status, response).await),
        }
    }

    async fn upsert(&self, collection: &str, record: IndexRecord) -> Result<(), IndexError> {
        let collection_id = self.get_collection_id(collection).await?;
        let url = self.collection_operation_url(&collection_id, "upsert");

        let request = ChromaUpsertRequest {
            ids: vec![record.id.clone()],
            embeddings: vec![record.embedding],
            metadatas: Some(vec![record.metadata]),
            documents: Some(vec![record.document]),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(connection_error)?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => {
                tracing::trace!("Upserted vector: {}", record.id);
                Ok(())
            }
            status => Err(api_error(status, response).await),
        }
    }

    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<ScoredPoint>, IndexError> {
        let collection_id = self.get_collection_id(collection).await?;
        let url = self.collection_operation_url(&collection_id, "query");

        let request = ChromaQueryRequest {
            query_embeddings: vec![embedding.to_vec()],
            n_results: top_k as u32,
            where_clause: filter.where_clause(),
            include: vec![
                "distances".to_string(),
                "metadatas".to_string(),
                "documents".to_string(),
            ],
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(connection_error)?;

        match response.status() {
            StatusCode::OK => {
                let query_response: ChromaQueryResponse =
                    response.json().await.map_err(connection_error)?;
                Ok(self.parse_query_results(query_response))
            }
            status => Err(api_error(status, response).await),
        }
    }

    /// Health check - uses v2 heartbeat.
    async fn ping(&self) -> Result<(), IndexError> {
        let url = format!("{}/api/v2/heartbeat", self.base_url);
        self.client
            .get(&url)
            .send()
            .await
            .map_err(connection_error)?
            .error_for_status()
            .map_err(connection_error)?;
        Ok(())
    }
}

fn connection_error(err: reqwest::Error) -> IndexError {
    IndexError::Unavailable(err.to_string())
}

async fn api_error(status: StatusCode, response: reqwest::Response) -> IndexError {
    let message = response.text().await.unwrap_or_default();
    IndexError::Api {
        status: status.as_u16(),
        message,
    }
}
