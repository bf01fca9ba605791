//! Similarity and ranking (C3): the primitives `Search` and deduplication
//! build on. Weights are a configuration constant, not a learned model — this
//! engine does no reranking.

use std::collections::HashSet;

/// Fixed weights for the ranking combiner `R = w_sem*s_sem + w_kw*s_kw + ...`.
#[derive(Debug, Clone, Copy)]
pub struct RankingWeights {
    pub semantic: f32,
    pub keyword: f32,
    pub entity: f32,
    pub recency: f32,
    pub frequency: f32,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            semantic: 0.50,
            keyword: 0.20,
            entity: 0.15,
            recency: 0.10,
            frequency: 0.05,
        }
    }
}

/// Sub-scores feeding the combiner, each expected in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubScores {
    pub semantic: f32,
    pub keyword: f32,
    pub entity: f32,
    pub recency: f32,
    pub frequency: f32,
}

impl RankingWeights {
    pub fn combine(&self, scores: SubScores) -> f32 {
        self.semantic * scores.semantic
            + self.keyword * scores.keyword
            + self.entity * scores.entity
            + self.recency * scores.recency
            + self.frequency * scores.frequency
    }
}

/// Lowercase word-overlap similarity, used by duplicate detection and the
/// keyword index's scoring fallback.
pub fn token_jaccard(a: &str, b: &str) -> f32 {
    let tokens_a = tokenize(a);
    let tokens_b = tokenize(b);

    if tokens_a.is_empty() && tokens_b.is_empty() {
        return 0.0;
    }

    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.union(&tokens_b).count();

    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}

/// Cosine similarity between two vectors, assumed already L2-normalized.
/// Returns 0.0 for mismatched dimensions or zero vectors rather than erroring
/// — callers treat a missing embedding as "no semantic signal", not a fault.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum::<f32>().clamp(-1.0, 1.0)
}

/// L2-normalizes a vector in place; leaves zero vectors untouched.
pub fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jaccard_identical_strings_is_one() {
        assert!((token_jaccard("remember the milk", "remember the milk") - 1.0).abs() < 1e-6);
    }

    #[test]
    fn jaccard_disjoint_strings_is_zero() {
        assert_eq!(token_jaccard("apples", "oranges"), 0.0);
    }

    #[test]
    fn jaccard_both_empty_is_zero() {
        assert_eq!(token_jaccard("", ""), 0.0);
    }

    #[test]
    fn cosine_of_identical_unit_vectors_is_one() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((cosine(&v, &v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn cosine_mismatched_lengths_is_zero() {
        assert_eq!(cosine(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn combiner_matches_spec_weights() {
        let weights = RankingWeights::default();
        let scores = SubScores {
            semantic: 1.0,
            keyword: 1.0,
            entity: 1.0,
            recency: 1.0,
            frequency: 1.0,
        };
        assert!((weights.combine(scores) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn normalize_leaves_zero_vector_untouched() {
        let mut v = vec![0.0, 0.0];
        normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0]);
    }
}
