//! Capability traits at the external seams: the text-embedding model and the
//! optional external vector-index service.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A text→vector model. Implementations must be order-preserving: output
/// vector `i` corresponds to input text `i`, and every vector has exactly
/// `dimension()` components.
#[async_trait]
pub trait TextEncoder: Send + Sync {
    /// Encode a batch of texts into fixed-length vectors.
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// The fixed output dimension of this model.
    fn dimension(&self) -> usize;

    /// Model name for identification and logging.
    fn model_name(&self) -> &str;
}

/// A point stored in the external vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexPoint {
    pub id: String,
    pub values: Vec<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// A ranked id returned by a vector-index query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredId {
    pub id: String,
    pub score: f32,
}

/// The external vector-index service used by the legacy upsert/delete path.
/// The primary ranking path does not depend on this.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Upsert vectors by id.
    async fn upsert(&self, points: Vec<IndexPoint>) -> Result<()>;

    /// Delete vectors by id.
    async fn delete(&self, ids: &[String]) -> Result<()>;

    /// Query the top-k nearest ids for a vector.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredId>>;

    /// Provider name for logging.
    fn provider_name(&self) -> &str;
}
