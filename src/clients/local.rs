//! Local embedding model client using ONNX Runtime.
//!
//! Runs the sentence-transformer entirely on-device; no external API calls.
//! Loading the model is expensive, so the engine constructs this client at
//! most once per process.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Mutex;
use tokenizers::Tokenizer;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::traits::TextEncoder;

/// Configuration for the local embedding model.
#[derive(Debug, Clone)]
pub struct LocalModelConfig {
    /// Path to the ONNX model file.
    pub model_path: String,
    /// Path to the tokenizer.json file.
    pub tokenizer_path: String,
    /// Output embedding dimension.
    pub dimension: usize,
    /// Maximum sequence length.
    pub max_length: usize,
    /// Model name for identification.
    pub model_name: String,
    /// LRU cache capacity (entries).
    pub cache_size: usize,
}

impl Default for LocalModelConfig {
    fn default() -> Self {
        Self {
            model_path: "./models/all-MiniLM-L6-v2.onnx".to_string(),
            tokenizer_path: "./models/tokenizer.json".to_string(),
            dimension: 384,
            max_length: 512,
            model_name: "all-MiniLM-L6-v2".to_string(),
            cache_size: 10000,
        }
    }
}

/// Local embedding client using ONNX Runtime for inference.
pub struct LocalOnnxEncoder {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    config: LocalModelConfig,
    // Cache for frequently re-embedded summaries
    cache: RwLock<lru::LruCache<String, Vec<f32>>>,
}

impl LocalOnnxEncoder {
    /// Create a new local encoder, loading the model and tokenizer from disk.
    pub fn new(config: LocalModelConfig) -> Result<Self> {
        info!("Initializing local embedding model: {}", config.model_name);

        if !Path::new(&config.model_path).exists() {
            return Err(anyhow!(
                "Model file not found: {}. Please download the model first.",
                config.model_path
            ));
        }
        if !Path::new(&config.tokenizer_path).exists() {
            return Err(anyhow!(
                "Tokenizer file not found: {}. Please download the tokenizer first.",
                config.tokenizer_path
            ));
        }

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(&config.model_path)?;

        info!("✓ ONNX session created for {}", config.model_name);

        let tokenizer = Tokenizer::from_file(&config.tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;

        info!("✓ Tokenizer loaded");

        let cache = lru::LruCache::new(
            std::num::NonZeroUsize::new(config.cache_size.max(1))
                .ok_or_else(|| anyhow!("cache size must be non-zero"))?,
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            config,
            cache: RwLock::new(cache),
        })
    }

    /// Create with default configuration (all-MiniLM-L6-v2).
    pub fn with_defaults() -> Result<Self> {
        Self::new(LocalModelConfig::default())
    }

    /// Tokenize and encode text for the model.
    fn encode_text(&self, text: &str) -> Result<(Vec<i64>, Vec<i64>)> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow!("Tokenization failed: {}", e))?;

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();

        // Truncate to max length
        let max_len = self.config.max_length;
        let input_ids = if input_ids.len() > max_len {
            input_ids[..max_len].to_vec()
        } else {
            input_ids
        };
        let attention_mask = if attention_mask.len() > max_len {
            attention_mask[..max_len].to_vec()
        } else {
            attention_mask
        };

        Ok((input_ids, attention_mask))
    }

    /// Run inference on a single text.
    fn run_inference(&self, text: &str) -> Result<Vec<f32>> {
        let (input_ids, attention_mask) = self.encode_text(text)?;
        let seq_len = input_ids.len();

        let input_ids_tensor =
            Tensor::from_array(([1usize, seq_len], input_ids.into_boxed_slice()))?;
        let attention_mask_tensor =
            Tensor::from_array(([1usize, seq_len], attention_mask.into_boxed_slice()))?;
        let token_type_ids: Vec<i64> = vec![0i64; seq_len];
        let token_type_ids_tensor =
            Tensor::from_array(([1usize, seq_len], token_type_ids.into_boxed_slice()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow!("Failed to lock session: {}", e))?;
        let outputs = session.run(ort::inputs![
            input_ids_tensor,
            attention_mask_tensor,
            token_type_ids_tensor,
        ])?;

        let output = outputs
            .iter()
            .next()
            .ok_or_else(|| anyhow!("No output tensor found"))?
            .1;

        let (shape, data) = output.try_extract_tensor::<f32>()?;

        // Shape is [batch, seq_len, hidden_size] (needs pooling) or
        // [batch, hidden_size] (already pooled).
        let embedding = if shape.len() == 3 {
            let hidden_size = shape[2] as usize;
            let seq_len = shape[1] as usize;

            let mut pooled = vec![0.0f32; hidden_size];
            for (i, slot) in pooled.iter_mut().enumerate() {
                let mut sum = 0.0;
                for j in 0..seq_len {
                    sum += data[j * hidden_size + i];
                }
                *slot = sum / seq_len as f32;
            }

            let norm: f32 = pooled.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                pooled.iter_mut().for_each(|x| *x /= norm);
            }

            pooled
        } else if shape.len() == 2 {
            let embedding: Vec<f32> = data.to_vec();
            let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                embedding.iter().map(|x| x / norm).collect()
            } else {
                embedding
            }
        } else {
            return Err(anyhow!("Unexpected output tensor shape: {:?}", shape));
        };

        Ok(embedding)
    }

    /// Generate cache key for text.
    fn cache_key(&self, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("{}:{}", self.config.model_name, text));
        format!("{:x}", hasher.finalize())
    }
}

#[async_trait]
impl TextEncoder for LocalOnnxEncoder {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let mut vectors: Vec<(usize, Vec<f32>)> = Vec::with_capacity(texts.len());
        let mut to_embed: Vec<(usize, &String)> = Vec::new();

        {
            let cache = self.cache.read().await;
            for (i, text) in texts.iter().enumerate() {
                if let Some(cached) = cache.peek(&self.cache_key(text)) {
                    vectors.push((i, cached.clone()));
                } else {
                    to_embed.push((i, text));
                }
            }
        }

        debug!(
            cached = vectors.len(),
            uncached = to_embed.len(),
            "batch encode"
        );

        if !to_embed.is_empty() {
            let mut fresh = Vec::with_capacity(to_embed.len());
            for (i, text) in &to_embed {
                fresh.push((*i, self.run_inference(text)?));
            }

            let mut cache = self.cache.write().await;
            for ((_, text), (i, embedding)) in to_embed.iter().zip(fresh.into_iter()) {
                cache.put(self.cache_key(text), embedding.clone());
                vectors.push((i, embedding));
            }
        }

        vectors.sort_by_key(|(i, _)| *i);
        Ok(vectors.into_iter().map(|(_, v)| v).collect())
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires model files to be present
    async fn local_model_encodes_at_fixed_dimension() {
        let encoder = LocalOnnxEncoder::with_defaults().unwrap();

        let vectors = encoder
            .encode(&["Hello, world!".to_string()])
            .await
            .unwrap();

        assert_eq!(vectors.len(), 1);
        assert_eq!(vectors[0].len(), 384);
    }

    #[tokio::test]
    #[ignore] // Requires model files to be present
    async fn batch_encode_preserves_order() {
        let encoder = LocalOnnxEncoder::with_defaults().unwrap();

        let texts = vec!["Hello".to_string(), "World".to_string()];
        let first = encoder.encode(&texts).await.unwrap();
        let second = encoder.encode(&texts).await.unwrap();

        assert_eq!(first.len(), 2);
        // Second pass is served from cache and must match exactly.
        assert_eq!(first, second);
    }
}
