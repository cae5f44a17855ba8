//! HTTP client for the external vector-index service.
//!
//! Used only by the legacy `upsert_embeddings`/`delete_embeddings` event
//! handlers; the primary ranking path reads stored embeddings directly.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::traits::{IndexPoint, ScoredId, VectorIndex};

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [IndexPoint],
}

#[derive(Debug, Serialize)]
struct DeleteRequest<'a> {
    ids: &'a [String],
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_values: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    id: String,
    score: f32,
}

/// Client for a Pinecone-style vector-index HTTP API.
pub struct HttpVectorIndex {
    client: Client,
    api_key: String,
    base_url: String,
}

impl HttpVectorIndex {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url,
        }
    }

    pub fn is_available(&self) -> bool {
        !self.api_key.is_empty() && !self.base_url.is_empty()
    }

    async fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header("Api-Key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Vector index error ({}): {}", status, error_text));
        }
        Ok(response)
    }
}

#[async_trait]
impl VectorIndex for HttpVectorIndex {
    async fn upsert(&self, points: Vec<IndexPoint>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        self.post_json("/vectors/upsert", &UpsertRequest { vectors: &points })
            .await?;
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.post_json("/vectors/delete", &DeleteRequest { ids })
            .await?;
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredId>> {
        let response = self
            .post_json(
                "/query",
                &QueryRequest {
                    vector,
                    top_k,
                    include_values: false,
                },
            )
            .await?;

        let parsed: QueryResponse = response.json().await?;
        Ok(parsed
            .matches
            .into_iter()
            .map(|m| ScoredId {
                id: m.id,
                score: m.score,
            })
            .collect())
    }

    fn provider_name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn availability_requires_key_and_url() {
        let configured =
            HttpVectorIndex::new("https://index.example".to_string(), "key".to_string());
        assert!(configured.is_available());

        let missing_key = HttpVectorIndex::new("https://index.example".to_string(), String::new());
        assert!(!missing_key.is_available());
    }
}
