//! Cosine-similarity reranking over a retrieved candidate pool.

use rayon::prelude::*;
use serde::Serialize;
use tracing::warn;

use crate::profile::Candidate;

/// Raw cosine similarity in `[-1.0, 1.0]`. `None` when the vectors are empty
/// or their dimensions disagree.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }

    let (dot, norm_a, norm_b) = a
        .par_iter()
        .zip(b.par_iter())
        .map(|(x, y)| (x * y, x * x, y * y))
        .reduce(
            || (0.0f32, 0.0f32, 0.0f32),
            |acc, v| (acc.0 + v.0, acc.1 + v.1, acc.2 + v.2),
        );

    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// A candidate with its similarity score. The stored embedding is stripped
/// before this leaves the reranker.
#[derive(Debug, Clone, Serialize)]
pub struct RankedCandidate {
    #[serde(flatten)]
    pub candidate: Candidate,
    pub score: f32,
}

/// Scores a candidate pool against a query vector and keeps the top `k`.
#[derive(Debug, Default)]
pub struct SimilarityReranker;

impl SimilarityReranker {
    pub fn new() -> Self {
        Self
    }

    /// Rank `pool` by descending cosine similarity to `query`, ties broken
    /// by ascending id. Candidates without a usable embedding are dropped.
    pub fn rank(&self, query: &[f32], pool: Vec<Candidate>, k: usize) -> Vec<RankedCandidate> {
        let mut ranked: Vec<RankedCandidate> = pool
            .into_par_iter()
            .filter_map(|mut candidate| {
                let Some(embedding) = candidate.embedding.take() else {
                    return None;
                };
                match cosine_similarity(query, &embedding) {
                    Some(score) => Some(RankedCandidate { candidate, score }),
                    None => {
                        warn!(
                            candidate = %candidate.id,
                            expected = query.len(),
                            actual = embedding.len(),
                            "Skipping candidate with mismatched embedding"
                        );
                        None
                    }
                }
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.candidate.id.cmp(&b.candidate.id))
        });
        ranked.truncate(k);
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, embedding: Option<Vec<f32>>) -> Candidate {
        Candidate {
            id: id.to_string(),
            embedding,
            ..Candidate::default()
        }
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.3, -0.2, 0.9];
        let score = cosine_similarity(&v, &v).unwrap();
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_opposite_vectors_is_minus_one() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![-1.0, -2.0, -3.0];
        let score = cosine_similarity(&a, &b).unwrap();
        assert!((score + 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_rejects_mismatched_empty_and_zero_vectors() {
        assert!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]).is_none());
        assert!(cosine_similarity(&[], &[]).is_none());
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]).is_none());
    }

    #[test]
    fn ranks_by_score_with_id_tie_break() {
        let query = vec![1.0, 0.0];
        let pool = vec![
            candidate("c", Some(vec![1.0, 0.0])),
            candidate("a", Some(vec![0.0, 1.0])),
            candidate("b", Some(vec![1.0, 0.0])),
        ];

        let ranked = SimilarityReranker::new().rank(&query, pool, 3);
        let ids: Vec<&str> = ranked.iter().map(|r| r.candidate.id.as_str()).collect();
        // b and c tie at 1.0 and sort by id; a scores 0.0.
        assert_eq!(ids, vec!["b", "c", "a"]);
        assert!(ranked.iter().all(|r| (-1.0..=1.0).contains(&r.score)));
    }

    #[test]
    fn drops_candidates_without_usable_embeddings() {
        let query = vec![1.0, 0.0];
        let pool = vec![
            candidate("no-embedding", None),
            candidate("wrong-dim", Some(vec![1.0, 0.0, 0.0])),
            candidate("ok", Some(vec![0.5, 0.5])),
        ];

        let ranked = SimilarityReranker::new().rank(&query, pool, 10);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].candidate.id, "ok");
    }

    #[test]
    fn k_larger_than_pool_returns_everything() {
        let query = vec![1.0, 0.0];
        let pool = vec![candidate("a", Some(vec![1.0, 0.0]))];
        assert_eq!(SimilarityReranker::new().rank(&query, pool, 50).len(), 1);
    }

    #[test]
    fn ranked_output_has_no_embedding() {
        let query = vec![1.0, 0.0];
        let pool = vec![candidate("a", Some(vec![1.0, 0.0]))];
        let ranked = SimilarityReranker::new().rank(&query, pool, 1);
        assert!(ranked[0].candidate.embedding.is_none());
    }
}
