//! Batched embedding engine.
//!
//! Owns the text encoder behind an exactly-once async initializer: the model
//! is loaded on first use (or at warm-up) no matter how many callers race.
//! Strict single-batch encoding is for request paths; the lossy multi-batch
//! variant is for bulk event processing where one bad batch must not sink
//! the rest.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use tokio::sync::OnceCell;
use tracing::{error, info};

use crate::clients::{HashEncoder, LocalModelConfig, LocalOnnxEncoder};
use crate::config::Config;
use crate::traits::TextEncoder;

type SharedEncoder = Arc<dyn TextEncoder>;
type EncoderFuture = Pin<Box<dyn Future<Output = Result<SharedEncoder>> + Send>>;
type EncoderFactory = Box<dyn Fn() -> EncoderFuture + Send + Sync>;

/// Result of a lossy multi-batch encode: `vectors[i]` is `None` when the
/// sub-batch containing text `i` failed.
#[derive(Debug)]
pub struct BatchOutcome {
    pub vectors: Vec<Option<Vec<f32>>>,
    pub skipped: usize,
}

pub struct EmbeddingEngine {
    encoder: OnceCell<SharedEncoder>,
    factory: EncoderFactory,
    batch_size: usize,
}

impl EmbeddingEngine {
    /// Build an engine around an arbitrary encoder factory. The factory runs
    /// at most once for the lifetime of the engine.
    pub fn with_factory<F, Fut>(batch_size: usize, factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<SharedEncoder>> + Send + 'static,
    {
        Self {
            encoder: OnceCell::new(),
            factory: Box::new(move || Box::pin(factory())),
            batch_size: batch_size.max(1),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let batch_size = config.batch_size;
        match config.encoder.as_str() {
            "local" => {
                let model_config = LocalModelConfig {
                    model_path: config.model_path.clone(),
                    tokenizer_path: config.tokenizer_path.clone(),
                    dimension: config.embedding_dimension,
                    max_length: config.max_length,
                    model_name: config.model_name.clone(),
                    cache_size: config.cache_size,
                };
                Self::with_factory(batch_size, move || {
                    let model_config = model_config.clone();
                    async move {
                        // Model loading is blocking file and runtime work.
                        let encoder =
                            tokio::task::spawn_blocking(move || LocalOnnxEncoder::new(model_config))
                                .await??;
                        Ok(Arc::new(encoder) as SharedEncoder)
                    }
                })
            }
            _ => {
                let dimension = config.embedding_dimension;
                Self::with_factory(batch_size, move || async move {
                    Ok(Arc::new(HashEncoder::new(dimension)) as SharedEncoder)
                })
            }
        }
    }

    async fn encoder(&self) -> Result<&SharedEncoder> {
        self.encoder.get_or_try_init(|| (self.factory)()).await
    }

    /// Force model initialization now. Startup treats a failure here as
    /// fatal rather than deferring it to the first request.
    pub async fn warm_up(&self) -> Result<()> {
        let encoder = self.encoder().await?;
        info!(
            model = encoder.model_name(),
            dimension = encoder.dimension(),
            batch_size = self.batch_size,
            "Embedding engine ready"
        );
        Ok(())
    }

    /// Strict batch encode: every text yields a vector of exactly the model
    /// dimension, or the whole call fails.
    pub async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let encoder = self.encoder().await?;
        let vectors = encoder.encode(texts).await?;

        if vectors.len() != texts.len() {
            return Err(anyhow!(
                "Encoder returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            ));
        }
        let dimension = encoder.dimension();
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(anyhow!(
                "Encoder returned a {}-dimensional vector, expected {}",
                bad.len(),
                dimension
            ));
        }
        Ok(vectors)
    }

    /// Encode one text.
    pub async fn encode_one(&self, text: &str) -> Result<Vec<f32>> {
        let texts = [text.to_string()];
        let mut vectors = self.encode(&texts).await?;
        Ok(vectors.remove(0))
    }

    /// Lossy multi-batch encode for bulk pipelines: texts are split into
    /// sub-batches of the configured size, and a failed sub-batch is logged
    /// and skipped instead of failing the whole run.
    pub async fn encode_batches(&self, texts: &[String]) -> Result<BatchOutcome> {
        // Initialization failure is still fatal; only per-batch encode
        // errors are absorbed.
        self.encoder().await?;

        let mut vectors: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        let mut skipped = 0;

        for chunk in texts.chunks(self.batch_size) {
            match self.encode(chunk).await {
                Ok(batch) => vectors.extend(batch.into_iter().map(Some)),
                Err(err) => {
                    error!(batch_len = chunk.len(), error = %err, "Skipping failed batch");
                    vectors.extend(std::iter::repeat_with(|| None).take(chunk.len()));
                    skipped += chunk.len();
                }
            }
        }

        Ok(BatchOutcome { vectors, skipped })
    }

    pub async fn dimension(&self) -> Result<usize> {
        Ok(self.encoder().await?.dimension())
    }
}
