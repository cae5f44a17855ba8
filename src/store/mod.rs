//! Document-store capability boundary.
//!
//! The pipeline needs four capability shapes from its profile store: point
//! query by id, a staged candidate query, an atomic embedding-only update,
//! and an optional geo pre-pass. Any store capable of
//! filter + anti-join + random-sample queries can sit behind this trait.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::profile::{Candidate, Profile};

pub use memory::MemoryProfileStore;

/// Geo pre-pass parameters: nearest-neighbor bounded by a maximum radius.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoFilter {
    /// `[longitude, latitude]` center, taken from the requester's location.
    pub center: [f64; 2],
    /// Maximum distance from the center, in meters.
    pub max_distance_m: f64,
}

/// The ordered candidate query: each field corresponds to one retrieval
/// stage, applied in declaration order. Retrieval only filters; ranking
/// happens later.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateQuery {
    /// Optional geo pre-pass, applied before all other stages.
    pub geo: Option<GeoFilter>,
    /// Required profile status (`"active"`).
    pub status: String,
    /// The requester, always excluded from their own pool.
    pub exclude_id: String,
    /// When set, candidates must have exactly this gender.
    pub gender: Option<String>,
    /// Anti-join: exclude candidates the requester already interacted with.
    pub exclude_interactions_of: String,
    /// Working-set cap applied after filtering.
    pub limit: usize,
    /// Randomized sample size applied to the working set.
    pub sample: usize,
}

impl CandidateQuery {
    /// Standing pool policy: the working set is a multiple of the requested
    /// limit, then fully sampled for diversity across repeated calls.
    pub fn for_requester(requester: &Profile, pool_size: usize) -> Self {
        Self {
            geo: None,
            status: "active".to_string(),
            exclude_id: requester.id.clone(),
            gender: requester
                .gender_interest
                .clone()
                .filter(|g| !g.is_empty()),
            exclude_interactions_of: requester.id.clone(),
            limit: pool_size,
            sample: pool_size,
        }
    }

    pub fn with_geo(mut self, center: [f64; 2], max_distance_m: f64) -> Self {
        self.geo = Some(GeoFilter {
            center,
            max_distance_m,
        });
        self
    }
}

/// Profile store capabilities required by the pipeline.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Point query by identifier.
    async fn find_by_id(&self, id: &str) -> Result<Option<Profile>>;

    /// Execute the staged candidate query, returning projected candidates.
    async fn find_candidates(&self, query: &CandidateQuery) -> Result<Vec<Candidate>>;

    /// Atomically update only the embedding field of one profile.
    /// Returns `false` when no profile matches the id (missing target).
    async fn set_embedding(&self, id: &str, embedding: &[f32]) -> Result<bool>;
}
