//! Deterministic feature-hashing text encoder.
//!
//! Needs no model files, which makes it the default encoder for tests and
//! environments without the ONNX model on disk. Token hashing uses SipHash-1-3
//! with fixed keys so vectors are stable across processes and Rust versions.

use std::hash::{Hash, Hasher};

use anyhow::Result;
use async_trait::async_trait;
use siphasher::sip::SipHasher13;

use crate::traits::TextEncoder;

// Changing either seed changes every stored embedding.
const HASH_SEED_K0: u64 = 0x7d28_66f1_93c1_0b4a;
const HASH_SEED_K1: u64 = 0x51c3_ab09_e477_2d68;

pub struct HashEncoder {
    dimension: usize,
}

impl HashEncoder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn hash_token(&self, token: &str) -> usize {
        let mut hasher = SipHasher13::new_with_keys(HASH_SEED_K0, HASH_SEED_K1);
        token.hash(&mut hasher);
        (hasher.finish() as usize) % self.dimension
    }

    fn encode_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in tokenize(text) {
            let idx = self.hash_token(&token);
            // Sign hashing keeps the expected value of collisions at zero.
            let sign = if self.hash_token(&format!("{token}_sign")) % 2 == 0 {
                1.0
            } else {
                -1.0
            };
            vector[idx] += sign;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

#[async_trait]
impl TextEncoder for HashEncoder {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.encode_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "feature-hash"
    }
}
