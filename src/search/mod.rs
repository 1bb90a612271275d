//! Hybrid search: weighted keyword scoring with synonym expansion and intent
//! bonuses, an ANN-free cosine vector scan, and Reciprocal Rank Fusion.

pub mod keyword;
pub mod rrf;
pub mod synonyms;
pub mod vector;

pub use keyword::KeywordQuery;
pub use rrf::{FusedHit, Source};

use crate::error::RagError;
use crate::providers::EmbeddingProvider;
use crate::store::ShardStore;

/// Runs both rankers over every shard and fuses their results.
///
/// Vector-scorer failures (no API key, provider error) degrade gracefully to
/// keyword-only results. Keyword-scorer failure is fatal — it only fails on
/// a storage error, which is propagated.
pub async fn hybrid_search(
    store: &ShardStore,
    embedder: &dyn EmbeddingProvider,
    query: &str,
    limit: usize,
) -> Result<Vec<FusedHit>, RagError> {
    let keyword_query = KeywordQuery::new(query);
    let keyword_results = store.search_chunks_scored(query, limit).await?;

    let vector_results = match embedder.embed_one(query).await {
        Ok(vector) => store.vector_search_chunks(&vector, limit).await.unwrap_or_default(),
        Err(err) => {
            tracing::warn!(error = %err, "vector scorer unavailable, degrading to keyword-only search");
            Vec::new()
        }
    };

    Ok(rrf::fuse(keyword_results, vector_results, &keyword_query, limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking;
    use crate::providers::MockEmbeddingProvider;
    use tempfile::tempdir;

    #[tokio::test]
    async fn search_ranks_the_matching_chunk_first() {
        let dir = tempdir().unwrap();
        let store = ShardStore::new(dir.path());
        let doc_id = "doc-net".to_string();

        let text = "nv set interface swp1 link state up\nnv config apply";
        let chunks = chunking::chunk(&doc_id, text, 4000, 2000, 600);
        store.create_chunks(chunks).await.unwrap();

        let embedder = MockEmbeddingProvider::new();
        let hits = hybrid_search(&store, &embedder, "configure swp1", 5).await.unwrap();

        assert!(!hits.is_empty());
        assert!(hits[0].chunk.content.contains("swp1"));
        assert!(hits[0].sources.contains(&Source::Keyword));
    }

    #[tokio::test]
    async fn no_matching_terms_returns_empty() {
        let dir = tempdir().unwrap();
        let store = ShardStore::new(dir.path());
        let doc_id = "doc-empty".to_string();
        let chunks = chunking::chunk(&doc_id, "completely unrelated banana content", 4000, 2000, 600);
        store.create_chunks(chunks).await.unwrap();

        let embedder = MockEmbeddingProvider::new();
        let hits = hybrid_search(&store, &embedder, "xyzzy plugh nonsense", 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn vector_provider_failure_degrades_to_keyword_only() {
        struct FailingEmbedder;
        #[async_trait::async_trait]
        impl EmbeddingProvider for FailingEmbedder {
            async fn embed(&self, _inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
                Err(RagError::Provider("no api key".into()))
            }
        }

        let dir = tempdir().unwrap();
        let store = ShardStore::new(dir.path());
        let doc_id = "doc-degrade".to_string();
        let chunks = chunking::chunk(&doc_id, "nv set interface swp1 link state up", 4000, 2000, 600);
        store.create_chunks(chunks).await.unwrap();

        let hits = hybrid_search(&store, &FailingEmbedder, "configure swp1", 5).await.unwrap();
        assert!(!hits.is_empty());
        assert!(hits[0].sources.contains(&Source::Keyword));
        assert!(!hits[0].sources.contains(&Source::Vector));
    }
}
