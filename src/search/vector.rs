//! ANN-free cosine vector scan: every chunk's embedding is compared
//! directly against the query embedding, no index structure involved.

use crate::types::Chunk;

/// Chunks with a cosine similarity at or below this threshold are dropped.
pub const MIN_COSINE_SCORE: f32 = 0.2;

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Scores every embedded chunk in `chunks` against `query_vector`, keeping
/// those above [`MIN_COSINE_SCORE`] and returning the top `limit`.
pub fn vector_search(chunks: &[Chunk], query_vector: &[f32], limit: usize) -> Vec<(Chunk, f32)> {
    let mut scored: Vec<(Chunk, f32)> = chunks
        .iter()
        .filter_map(|c| c.embedding.as_ref().map(|e| (c, cosine_similarity(e, query_vector))))
        .filter(|(_, score)| *score > MIN_COSINE_SCORE)
        .map(|(c, score)| (c.clone(), score))
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_have_cosine_one() {
        let v = vec![0.1, 0.5, -0.3];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_have_cosine_zero() {
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-6);
    }

    #[test]
    fn mismatched_dimensions_score_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
    }
}
