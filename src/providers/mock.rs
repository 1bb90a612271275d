//! Deterministic hash-to-vector mock embedding provider for tests.

use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::RagError;

use super::embedding::EmbeddingProvider;

/// Produces a deterministic unit-length vector from a hash of the input text,
/// so the same content always embeds to the same vector and near-duplicate
/// content embeds close together (by hash bucket, not semantics).
pub struct MockEmbeddingProvider {
    dimension: usize,
    fail_substrings: Vec<String>,
    /// Fails every Nth call (1-indexed) when set, independent of content —
    /// used to simulate a fixed failure count across an otherwise-uniform
    /// work list.
    fail_every_nth: Option<usize>,
    calls: AtomicUsize,
}

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self {
            dimension: 8,
            fail_substrings: Vec::new(),
            fail_every_nth: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    pub fn failing_on(mut self, substring: impl Into<String>) -> Self {
        self.fail_substrings.push(substring.into());
        self
    }

    pub fn failing_every_nth(mut self, n: usize) -> Self {
        self.fail_every_nth = Some(n);
        self
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let mut out = Vec::with_capacity(inputs.len());
        for input in inputs {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

            if self.fail_substrings.iter().any(|s| input.contains(s.as_str())) {
                return Err(RagError::Provider("mock provider failure (matched marker)".into()));
            }
            if self.fail_every_nth.is_some_and(|n| n > 0 && call % n == 0) {
                return Err(RagError::Provider("mock provider failure (periodic)".into()));
            }

            out.push(hash_to_unit_vector(input, self.dimension));
        }
        Ok(out)
    }
}

fn hash_to_unit_vector(input: &str, dimension: usize) -> Vec<f32> {
    let mut raw = Vec::with_capacity(dimension);
    for i in 0..dimension {
        let mut hasher = DefaultHasher::new();
        input.hash(&mut hasher);
        i.hash(&mut hasher);
        let bits = hasher.finish();
        raw.push((bits % 2000) as f32 / 1000.0 - 1.0);
    }
    let norm: f32 = raw.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return raw;
    }
    raw.into_iter().map(|v| v / norm).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_input_embeds_identically() {
        let provider = MockEmbeddingProvider::new();
        let a = provider.embed_one("nv set interface swp1").await.unwrap();
        let b = provider.embed_one("nv set interface swp1").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn vectors_are_unit_length() {
        let provider = MockEmbeddingProvider::new();
        let v = provider.embed_one("any text").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn failing_on_marker_only_fails_matching_inputs() {
        let provider = MockEmbeddingProvider::new().failing_on("BOOM");
        assert!(provider.embed_one("safe content").await.is_ok());
        assert!(provider.embed_one("contains BOOM marker").await.is_err());
    }
}
