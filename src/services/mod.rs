//! Core services: embedding engine, retrieval, reranking, matching, and the
//! event-driven update pipeline.

pub mod engine;
pub mod matching;
pub mod pipeline;
pub mod reranker;
pub mod retriever;

pub use engine::EmbeddingEngine;
pub use matching::MatchingService;
pub use pipeline::EmbeddingUpdatePipeline;
pub use reranker::{RankedCandidate, SimilarityReranker};
pub use retriever::CandidateRetriever;
