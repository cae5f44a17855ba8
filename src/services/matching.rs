//! Matching orchestrator: retrieval, query-vector resolution, reranking.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use crate::profile::{Candidate, Profile};
use crate::services::engine::EmbeddingEngine;
use crate::services::reranker::{RankedCandidate, SimilarityReranker};
use crate::services::retriever::CandidateRetriever;
use crate::summary::summarize;

pub struct MatchingService {
    retriever: CandidateRetriever,
    reranker: SimilarityReranker,
    engine: Arc<EmbeddingEngine>,
}

impl MatchingService {
    pub fn new(retriever: CandidateRetriever, engine: Arc<EmbeddingEngine>) -> Self {
        Self {
            retriever,
            reranker: SimilarityReranker::new(),
            engine,
        }
    }

    /// Top-`limit` recommendations for a user, ranked by cosine similarity.
    /// An empty eligible pool is an empty result, not an error.
    pub async fn recommend(&self, user_id: &str, limit: usize) -> Result<Vec<RankedCandidate>> {
        let (requester, pool) = self.retriever.retrieve(user_id, limit).await?;
        self.rank_pool(&requester, pool, limit).await
    }

    /// Recommendations restricted to candidates within `max_distance_km` of
    /// the requester's location.
    pub async fn recommend_near(
        &self,
        user_id: &str,
        limit: usize,
        max_distance_km: f64,
    ) -> Result<Vec<RankedCandidate>> {
        let (requester, pool) = self
            .retriever
            .retrieve_near(user_id, limit, max_distance_km)
            .await?;
        self.rank_pool(&requester, pool, limit).await
    }

    /// The unranked eligible pool, for inspection. Embeddings never leave
    /// this service.
    pub async fn eligible_pool(&self, user_id: &str, limit: usize) -> Result<Vec<Candidate>> {
        let (_, mut pool) = self.retriever.retrieve(user_id, limit).await?;
        for candidate in &mut pool {
            candidate.embedding = None;
        }
        Ok(pool)
    }

    async fn rank_pool(
        &self,
        requester: &Profile,
        pool: Vec<Candidate>,
        limit: usize,
    ) -> Result<Vec<RankedCandidate>> {
        if pool.is_empty() {
            info!(requester = %requester.id, "No eligible candidates");
            return Ok(vec![]);
        }

        let query = self.query_vector(requester).await?;
        let ranked = self.reranker.rank(&query, pool, limit);
        debug!(requester = %requester.id, results = ranked.len(), "Ranked recommendations");
        Ok(ranked)
    }

    /// The stored embedding when present, otherwise encode the requester's
    /// bio on the fly.
    async fn query_vector(&self, requester: &Profile) -> Result<Vec<f32>> {
        if let Some(embedding) = &requester.embedding {
            return Ok(embedding.clone());
        }
        debug!(requester = %requester.id, "No stored embedding, encoding bio on the fly");
        self.engine.encode_one(&summarize(requester)).await
    }
}
