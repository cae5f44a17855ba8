//! Candidate retrieval: turns a requester id into an eligible pool.
//!
//! The pool is deliberately larger than the requested limit so the reranker
//! has headroom to drop unusable candidates and still fill the page.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::debug;

use crate::profile::{Candidate, Profile};
use crate::store::{CandidateQuery, ProfileStore};

pub struct CandidateRetriever {
    store: Arc<dyn ProfileStore>,
    pool_multiplier: usize,
}

impl CandidateRetriever {
    pub fn new(store: Arc<dyn ProfileStore>, pool_multiplier: usize) -> Self {
        Self {
            store,
            pool_multiplier: pool_multiplier.max(1),
        }
    }

    /// Load the requester and their eligible candidate pool. A missing
    /// requester is an error; an empty pool is not.
    pub async fn retrieve(
        &self,
        requester_id: &str,
        limit: usize,
    ) -> Result<(Profile, Vec<Candidate>)> {
        let requester = self
            .store
            .find_by_id(requester_id)
            .await?
            .ok_or_else(|| anyhow!("Profile not found: {requester_id}"))?;

        let query = CandidateQuery::for_requester(&requester, self.pool_size(limit));
        let pool = self.store.find_candidates(&query).await?;
        debug!(requester = requester_id, pool = pool.len(), "Retrieved candidate pool");
        Ok((requester, pool))
    }

    /// Like [`retrieve`](Self::retrieve), with a geo pre-pass around the
    /// requester's own location.
    pub async fn retrieve_near(
        &self,
        requester_id: &str,
        limit: usize,
        max_distance_km: f64,
    ) -> Result<(Profile, Vec<Candidate>)> {
        let requester = self
            .store
            .find_by_id(requester_id)
            .await?
            .ok_or_else(|| anyhow!("Profile not found: {requester_id}"))?;
        let location = requester
            .location
            .as_ref()
            .ok_or_else(|| anyhow!("Profile {requester_id} has no location for geo search"))?;

        let query = CandidateQuery::for_requester(&requester, self.pool_size(limit))
            .with_geo(location.coordinates, max_distance_km * 1000.0);
        let pool = self.store.find_candidates(&query).await?;
        Ok((requester, pool))
    }

    fn pool_size(&self, limit: usize) -> usize {
        limit.saturating_mul(self.pool_multiplier)
    }
}
