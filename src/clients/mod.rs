//! Encoder and vector-index client implementations.

pub mod hash;
pub mod local;
pub mod vector_index;

pub use hash::HashEncoder;
pub use local::{LocalModelConfig, LocalOnnxEncoder};
pub use vector_index::HttpVectorIndex;
