//! API models for request/response types.
//!
//! Defines the JSON request/response structures for the matching API.

use serde::{Deserialize, Serialize};

use crate::profile::Candidate;
use crate::services::RankedCandidate;

/// Query parameters for the recommendation endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchQuery {
    /// Maximum number of results to return.
    #[serde(default)]
    pub limit: Option<usize>,
    /// When set, restrict candidates to this radius around the requester.
    #[serde(default)]
    pub within_km: Option<f64>,
}

/// Response for a recommendation request.
#[derive(Debug, Clone, Serialize)]
pub struct MatchResponse {
    /// The requesting user.
    pub user_id: String,
    /// Number of matches returned.
    pub count: usize,
    /// Ranked matches, best first.
    pub matches: Vec<RankedCandidate>,
}

/// Response for an eligible-pool request.
#[derive(Debug, Clone, Serialize)]
pub struct PoolResponse {
    /// The requesting user.
    pub user_id: String,
    /// Number of candidates in the pool.
    pub count: usize,
    /// The unranked eligible pool.
    pub candidates: Vec<Candidate>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service name.
    pub service: String,
    /// Service version.
    pub version: String,
    /// Active encoder kind.
    pub encoder: String,
    /// Embedding dimension.
    pub dimension: usize,
    /// Number of profiles currently in the store.
    pub profiles: usize,
    /// Available endpoints.
    pub endpoints: Vec<String>,
}

/// Error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message.
    pub error: String,
    /// Error code (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}
