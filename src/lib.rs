//! Matchwise - Library Entry Point
//!
//! A recommendation matching service: profile summarization, local text
//! embeddings, multi-stage candidate retrieval, cosine reranking, and an
//! event-driven embedding update pipeline.

pub mod broker;
pub mod clients;
pub mod config;
pub mod handlers;
pub mod models;
pub mod profile;
pub mod services;
pub mod store;
pub mod summary;
pub mod traits;

// Re-export commonly used types
pub use broker::{EventRouter, QueueDescriptor, TopicBroker};
pub use clients::{HashEncoder, LocalModelConfig, LocalOnnxEncoder};
pub use config::Config;
pub use profile::{Candidate, ChangeEvent, Profile};
pub use services::{EmbeddingEngine, EmbeddingUpdatePipeline, MatchingService};
pub use store::{MemoryProfileStore, ProfileStore};
pub use traits::{TextEncoder, VectorIndex};
