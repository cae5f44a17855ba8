//! Configuration module for the matching service.

use crate::broker::QueueDescriptor;

/// Event type for a single-profile embedding refresh.
pub const EVENT_EMBED: &str = "user_ai.embed";
/// Event type for a bulk upsert into the external vector index.
pub const EVENT_UPSERT: &str = "user_ai.upsert_embeddings";
/// Event type for a bulk delete from the external vector index.
pub const EVENT_DELETE: &str = "user_ai.delete_embeddings";

/// Main service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    /// Which text encoder to run: `"hash"` or `"local"`.
    pub encoder: String,
    pub embedding_dimension: usize,
    pub model_path: String,
    pub tokenizer_path: String,
    pub model_name: String,
    pub max_length: usize,
    pub cache_size: usize,
    pub batch_size: usize,
    /// Maximum in-flight deliveries per consumer.
    pub prefetch_count: usize,
    /// Candidate pool size as a multiple of the requested limit.
    pub pool_multiplier: usize,
    pub default_limit: usize,
    pub max_limit: usize,
    /// Optional JSON file of profiles loaded into the store at startup.
    pub seed_path: Option<String>,
    // External vector index (legacy upsert/delete path)
    pub vector_index_url: Option<String>,
    pub vector_index_api_key: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3031),
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            encoder: std::env::var("ENCODER").unwrap_or_else(|_| "hash".to_string()),
            embedding_dimension: std::env::var("EMBEDDING_DIMENSION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(384),
            model_path: std::env::var("MODEL_PATH")
                .unwrap_or_else(|_| "./models/all-MiniLM-L6-v2.onnx".to_string()),
            tokenizer_path: std::env::var("TOKENIZER_PATH")
                .unwrap_or_else(|_| "./models/tokenizer.json".to_string()),
            model_name: std::env::var("MODEL_NAME")
                .unwrap_or_else(|_| "all-MiniLM-L6-v2".to_string()),
            max_length: std::env::var("MAX_SEQUENCE_LENGTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(512),
            cache_size: std::env::var("EMBEDDING_CACHE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10000),
            batch_size: std::env::var("EMBEDDING_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(100),
            prefetch_count: std::env::var("PREFETCH_COUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),
            pool_multiplier: std::env::var("POOL_MULTIPLIER")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
            default_limit: std::env::var("DEFAULT_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
            max_limit: std::env::var("MAX_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(100),
            seed_path: std::env::var("PROFILE_SEED_PATH").ok(),
            vector_index_url: std::env::var("VECTOR_INDEX_URL").ok(),
            vector_index_api_key: std::env::var("VECTOR_INDEX_API_KEY").ok(),
        }
    }

    /// Topology of the profile-change queue: durable, bound to the
    /// `user_events` topic exchange for every `user_ai.*` event.
    pub fn user_queue(&self) -> QueueDescriptor {
        QueueDescriptor {
            name: "user_queue".to_string(),
            exchange: "user_events".to_string(),
            routing_key_pattern: "user_ai.*".to_string(),
            durable: true,
        }
    }

    /// Whether the external vector index is configured.
    pub fn has_vector_index(&self) -> bool {
        self.vector_index_url.is_some() && self.vector_index_api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_queue_topology_names() {
        let config = Config {
            port: 3031,
            host: "0.0.0.0".to_string(),
            encoder: "hash".to_string(),
            embedding_dimension: 384,
            model_path: String::new(),
            tokenizer_path: String::new(),
            model_name: String::new(),
            max_length: 512,
            cache_size: 100,
            batch_size: 100,
            prefetch_count: 1,
            pool_multiplier: 3,
            default_limit: 20,
            max_limit: 100,
            seed_path: None,
            vector_index_url: None,
            vector_index_api_key: None,
        };

        let queue = config.user_queue();
        assert_eq!(queue.name, "user_queue");
        assert_eq!(queue.exchange, "user_events");
        assert_eq!(queue.routing_key_pattern, "user_ai.*");
        assert!(queue.durable);
        assert_eq!(queue.dlx_name(), "user_events_dlx");
        assert_eq!(queue.dlq_name(), "user_queue.dlq");
        assert!(!config.has_vector_index());
    }
}
