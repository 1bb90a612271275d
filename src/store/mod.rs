//! Sharded on-disk chunk store. See `SPEC_FULL.md` §4.2.
//!
//! Layout under `root`:
//! - `documents.json` — array of [`Document`] records.
//! - `chunks/<documentId>.json` — array of [`Chunk`] records for that document.
//! - `settings.json`, `categories.json`, `query_logs.json` — flat JSON, via [`FlatStore`].
//!
//! Every write goes through [`atomic_write_json`] (temp file + rename) under
//! a per-path serial lock ([`lock::PathLockMap`]); every read is served
//! through a 60s TTL cache ([`cache::ShardCache`]) that tolerates racing
//! with an in-flight writer because the rename is atomic.

mod cache;
mod flat;
mod lock;

pub use flat::FlatStore;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::fs;
use uuid::Uuid;

use crate::error::RagError;
use crate::types::{Chunk, ChunkStats, ChunkType, Document};

use cache::ShardCache;
use lock::PathLockMap;

/// Durable, crash-safe storage of documents and their chunks.
#[derive(Clone)]
pub struct ShardStore {
    root: PathBuf,
    locks: PathLockMap,
    cache: ShardCache,
}

impl ShardStore {
    /// Opens (without requiring it to exist yet) a shard tree rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: PathLockMap::new(),
            cache: ShardCache::default(),
        }
    }

    fn documents_path(&self) -> PathBuf {
        self.root.join("documents.json")
    }

    fn shard_path(&self, document_id: &str) -> PathBuf {
        self.root.join("chunks").join(format!("{document_id}.json"))
    }

    // ---- documents -----------------------------------------------------

    pub async fn list_documents(&self) -> Result<Vec<Document>, RagError> {
        self.load_array(&self.documents_path()).await
    }

    pub async fn get_document(&self, id: &str) -> Result<Option<Document>, RagError> {
        let docs = self.list_documents().await?;
        Ok(docs.into_iter().find(|d| d.id == id))
    }

    pub async fn create_document(&self, mut document: Document) -> Result<Document, RagError> {
        if document.id.is_empty() {
            document.id = Uuid::new_v4().to_string();
        }
        self.mutate_documents(|docs| {
            docs.push(document.clone());
        })
        .await?;
        Ok(document)
    }

    pub async fn update_document(
        &self,
        id: &str,
        patch: impl FnOnce(&mut Document) + Send,
    ) -> Result<Option<Document>, RagError> {
        let mut updated = None;
        self.mutate_documents(|docs| {
            if let Some(doc) = docs.iter_mut().find(|d| d.id == id) {
                patch(doc);
                updated = Some(doc.clone());
            }
        })
        .await?;
        Ok(updated)
    }

    pub async fn delete_document(&self, id: &str) -> Result<bool, RagError> {
        let mut removed = false;
        self.mutate_documents(|docs| {
            let before = docs.len();
            docs.retain(|d| d.id != id);
            removed = docs.len() != before;
        })
        .await?;

        let shard = self.shard_path(id);
        if shard.exists() {
            fs::remove_file(&shard).await.map_err(RagError::from)?;
        }
        self.cache.invalidate(&shard);
        Ok(removed)
    }

    async fn mutate_documents(
        &self,
        f: impl FnOnce(&mut Vec<Document>) + Send,
    ) -> Result<(), RagError> {
        let path = self.documents_path();
        let _guard = self.locks.lock(&path).await;
        let mut docs: Vec<Document> = load_array_uncached(&path).await;
        f(&mut docs);
        atomic_write_json(&path, &docs).await?;
        self.cache.invalidate(&path);
        Ok(())
    }

    // ---- chunks ----------------------------------------------------------

    pub async fn get_chunks(&self, document_id: &str) -> Result<Vec<Chunk>, RagError> {
        self.load_array(&self.shard_path(document_id)).await
    }

    pub async fn get_chunk(&self, document_id: &str, chunk_id: &str) -> Result<Option<Chunk>, RagError> {
        let chunks = self.get_chunks(document_id).await?;
        Ok(chunks.into_iter().find(|c| c.id == chunk_id))
    }

    pub async fn get_chunk_stats(&self, document_id: &str) -> Result<ChunkStats, RagError> {
        let chunks = self.get_chunks(document_id).await?;
        let mut stats = ChunkStats::default();
        stats.total = chunks.len();
        for c in &chunks {
            match c.chunk_type {
                ChunkType::Parent => stats.parent_count += 1,
                ChunkType::Child => stats.child_count += 1,
            }
            if c.has_embedding() {
                stats.with_embedding += 1;
            } else if c.chunk_type == ChunkType::Child {
                stats.requiring_embedding += 1;
            }
        }
        Ok(stats)
    }

    /// Persists `chunks`, which may span multiple documents, assigning fresh
    /// ids/`created_at` to any chunk missing them. Returns the persisted list.
    pub async fn create_chunks(&self, mut chunks: Vec<Chunk>) -> Result<Vec<Chunk>, RagError> {
        for chunk in &mut chunks {
            if chunk.id.is_empty() {
                chunk.id = Uuid::new_v4().to_string();
            }
        }

        let mut by_doc: std::collections::HashMap<String, Vec<Chunk>> = std::collections::HashMap::new();
        for chunk in chunks {
            by_doc.entry(chunk.document_id.clone()).or_default().push(chunk);
        }

        let mut persisted = Vec::new();
        for (doc_id, batch) in by_doc {
            let path = self.shard_path(&doc_id);
            let _guard = self.locks.lock(&path).await;
            let mut existing: Vec<Chunk> = load_array_uncached(&path).await;
            existing.extend(batch.iter().cloned());
            atomic_write_json(&path, &existing).await?;
            self.cache.invalidate(&path);
            persisted.extend(batch);
        }
        Ok(persisted)
    }

    /// Slow path: scans every shard file to find `chunk_id`. See
    /// `SPEC_FULL.md` §4.2 operations table.
    pub async fn update_chunk_embedding(&self, chunk_id: &str, embedding: Vec<f32>) -> Result<bool, RagError> {
        let chunks_dir = self.root.join("chunks");
        let mut entries = match fs::read_dir(&chunks_dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(RagError::from(err)),
        };

        while let Some(entry) = entries.next_entry().await.map_err(RagError::from)? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let _guard = self.locks.lock(&path).await;
            let mut chunks: Vec<Chunk> = load_array_uncached(&path).await;
            if let Some(chunk) = chunks.iter_mut().find(|c| c.id == chunk_id) {
                chunk.embedding = Some(embedding.clone());
                atomic_write_json(&path, &chunks).await?;
                self.cache.invalidate(&path);
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Fast path: writes embeddings for chunks known to belong to `document_id`
    /// in a single shard read/write. Returns `(success, failed)` counts.
    pub async fn update_chunk_embeddings(
        &self,
        document_id: &str,
        pairs: &[(String, Vec<f32>)],
    ) -> Result<(usize, usize), RagError> {
        let path = self.shard_path(document_id);
        let _guard = self.locks.lock(&path).await;
        let mut chunks: Vec<Chunk> = load_array_uncached(&path).await;

        let mut success = 0usize;
        let mut failed = 0usize;
        for (chunk_id, embedding) in pairs {
            if let Some(chunk) = chunks.iter_mut().find(|c| &c.id == chunk_id) {
                chunk.embedding = Some(embedding.clone());
                success += 1;
            } else {
                failed += 1;
            }
        }

        if success > 0 {
            atomic_write_json(&path, &chunks).await?;
            self.cache.invalidate(&path);
        }
        Ok((success, failed))
    }

    /// All document ids that currently have a shard file on disk.
    pub async fn list_shard_document_ids(&self) -> Result<Vec<String>, RagError> {
        let chunks_dir = self.root.join("chunks");
        let mut entries = match fs::read_dir(&chunks_dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(RagError::from(err)),
        };
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(RagError::from)? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        Ok(ids)
    }

    /// Every chunk across every shard. Heavy — mirrors `GET /api/chunks`
    /// from `SPEC_FULL.md` §6, flagged there as a "heavy" endpoint.
    pub async fn all_chunks(&self) -> Result<Vec<Chunk>, RagError> {
        let mut all = Vec::new();
        for id in self.list_shard_document_ids().await? {
            all.extend(self.get_chunks(&id).await?);
        }
        Ok(all)
    }

    // ---- search ------------------------------------------------------------

    /// Keyword-only search across every shard, returning plain [`Chunk`]s in
    /// ranked order. Used directly by callers that don't need fused scores.
    pub async fn search_chunks(&self, query: &str, limit: usize) -> Result<Vec<Chunk>, RagError> {
        Ok(self
            .search_chunks_scored(query, limit)
            .await?
            .into_iter()
            .map(|(chunk, _)| chunk)
            .collect())
    }

    /// Keyword scorer over every shard, keeping per-chunk raw scores for RRF.
    /// See `SPEC_FULL.md` §4.4 "A. Keyword scorer".
    pub async fn search_chunks_scored(&self, query: &str, limit: usize) -> Result<Vec<(Chunk, f64)>, RagError> {
        let keyword_query = crate::search::keyword::KeywordQuery::new(query);
        let documents = self.list_documents().await?;
        let mut buffer = crate::search::keyword::ScoredBuffer::new(limit);
        for chunk in self.all_chunks().await? {
            let filename = documents
                .iter()
                .find(|d| d.id == chunk.document_id)
                .map(|d| d.filename.as_str())
                .unwrap_or("");
            let document_bonus = keyword_query.filename_bonus(filename);
            if let Some(score) = keyword_query.score(&chunk.content, document_bonus) {
                buffer.push(chunk, score);
            }
        }
        Ok(buffer.finish())
    }

    /// Cosine vector scorer over every embedded chunk across every shard.
    /// See `SPEC_FULL.md` §4.4 "B. Vector scorer".
    pub async fn vector_search_chunks(&self, vector: &[f32], limit: usize) -> Result<Vec<(Chunk, f32)>, RagError> {
        let chunks = self.all_chunks().await?;
        Ok(crate::search::vector::vector_search(&chunks, vector, limit))
    }

    // ---- generic load/cache plumbing -------------------------------------

    async fn load_array<T: DeserializeOwned + Serialize + Clone>(&self, path: &Path) -> Result<Vec<T>, RagError> {
        if let Some(cached) = self.cache.get(path) {
            return Ok(serde_json::from_value((*cached).clone()).unwrap_or_default());
        }
        let value: Vec<T> = load_array_uncached(path).await;
        let as_value = serde_json::to_value(&value).unwrap_or(Value::Array(Vec::new()));
        self.cache.put(path, Arc::new(as_value));
        Ok(value)
    }
}

/// Loads a JSON array from `path` without consulting the cache. Missing
/// files are treated as empty; malformed JSON is logged and replaced by an
/// empty array rather than propagated as an error (§4.2, §7 "Storage").
async fn load_array_uncached<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    match fs::read_to_string(path).await {
        Ok(raw) => match serde_json::from_str(&raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "malformed shard JSON, treating as empty");
                Vec::new()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "failed to read shard file, treating as empty");
            Vec::new()
        }
    }
}

/// Writes `value` to `path` as pretty-printed UTF-8 JSON via a `.tmp.<nonce>`
/// file followed by an atomic rename. Creates parent directories as needed.
/// On any write failure the temp file is best-effort removed.
pub(crate) async fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), RagError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await.map_err(RagError::from)?;
        }
    }

    let nonce = Uuid::new_v4();
    let tmp_path = path.with_extension(format!(
        "{}.tmp.{nonce}",
        path.extension().and_then(|e| e.to_str()).unwrap_or("json")
    ));

    let serialized = match serde_json::to_vec_pretty(value) {
        Ok(bytes) => bytes,
        Err(err) => return Err(RagError::from(err)),
    };

    if let Err(err) = fs::write(&tmp_path, &serialized).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(RagError::from(err));
    }

    if let Err(err) = fs::rename(&tmp_path, path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(RagError::from(err));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChunkMetadata, ChunkType, DocumentStatus};
    use chrono::Utc;
    use tempfile::tempdir;

    fn sample_document() -> Document {
        Document {
            id: String::new(),
            filename: "runbook.md".into(),
            file_type: "text/markdown".into(),
            file_size: 128,
            category: None,
            content_preview: String::new(),
            uploaded_at: Utc::now(),
            status: DocumentStatus::Processing,
            error_message: None,
            user_id: None,
        }
    }

    fn sample_chunk(document_id: &str, index: usize, chunk_type: ChunkType) -> Chunk {
        Chunk {
            id: Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            content: format!("chunk body {index}"),
            chunk_index: index,
            token_count: 3,
            chunk_type,
            parent_id: None,
            embedding: None,
            metadata: ChunkMetadata::default(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn create_then_list_document_round_trips() {
        let dir = tempdir().unwrap();
        let store = ShardStore::new(dir.path());
        let created = store.create_document(sample_document()).await.unwrap();
        assert!(!created.id.is_empty());

        let docs = store.list_documents().await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, created.id);
    }

    #[tokio::test]
    async fn create_chunks_then_get_chunks_contains_every_submitted_chunk() {
        let dir = tempdir().unwrap();
        let store = ShardStore::new(dir.path());
        let doc_id = "doc-1".to_string();
        let submitted = vec![
            sample_chunk(&doc_id, 0, ChunkType::Parent),
            sample_chunk(&doc_id, 1, ChunkType::Child),
        ];
        store.create_chunks(submitted.clone()).await.unwrap();

        let fetched = store.get_chunks(&doc_id).await.unwrap();
        assert_eq!(fetched.len(), 2);
        for chunk in &submitted {
            assert!(fetched.iter().any(|c| c.id == chunk.id));
        }
    }

    #[tokio::test]
    async fn create_chunks_backfills_a_missing_id() {
        let dir = tempdir().unwrap();
        let store = ShardStore::new(dir.path());
        let doc_id = "doc-backfill".to_string();
        let mut chunk = sample_chunk(&doc_id, 0, ChunkType::Parent);
        chunk.id.clear();

        let persisted = store.create_chunks(vec![chunk]).await.unwrap();
        assert_eq!(persisted.len(), 1);
        assert!(!persisted[0].id.is_empty());

        let fetched = store.get_chunks(&doc_id).await.unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].id, persisted[0].id);
    }

    #[tokio::test]
    async fn update_chunk_embedding_is_visible_on_read() {
        let dir = tempdir().unwrap();
        let store = ShardStore::new(dir.path());
        let doc_id = "doc-2".to_string();
        let chunk = sample_chunk(&doc_id, 0, ChunkType::Child);
        let chunk_id = chunk.id.clone();
        store.create_chunks(vec![chunk]).await.unwrap();

        let found = store
            .update_chunk_embedding(&chunk_id, vec![0.1, 0.2, 0.3])
            .await
            .unwrap();
        assert!(found);

        let fetched = store.get_chunk(&doc_id, &chunk_id).await.unwrap().unwrap();
        assert_eq!(fetched.embedding, Some(vec![0.1, 0.2, 0.3]));
    }

    #[tokio::test]
    async fn delete_document_removes_chunks_and_shard_file() {
        let dir = tempdir().unwrap();
        let store = ShardStore::new(dir.path());
        let doc_id = "doc-3".to_string();
        store.create_chunks(vec![sample_chunk(&doc_id, 0, ChunkType::Parent)]).await.unwrap();
        store
            .create_document(Document { id: doc_id.clone(), ..sample_document() })
            .await
            .unwrap();

        let removed = store.delete_document(&doc_id).await.unwrap();
        assert!(removed);
        assert!(store.get_chunks(&doc_id).await.unwrap().is_empty());
        assert!(!dir.path().join("chunks").join(format!("{doc_id}.json")).exists());
    }

    #[tokio::test]
    async fn missing_shard_reads_as_empty_not_error() {
        let dir = tempdir().unwrap();
        let store = ShardStore::new(dir.path());
        let chunks = store.get_chunks("does-not-exist").await.unwrap();
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn malformed_shard_json_is_treated_as_empty() {
        let dir = tempdir().unwrap();
        let chunks_dir = dir.path().join("chunks");
        fs::create_dir_all(&chunks_dir).await.unwrap();
        fs::write(chunks_dir.join("broken.json"), b"not json").await.unwrap();

        let store = ShardStore::new(dir.path());
        let chunks = store.get_chunks("broken").await.unwrap();
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn concurrent_create_chunks_union_to_the_same_shard() {
        let dir = tempdir().unwrap();
        let store = ShardStore::new(dir.path());
        let doc_id = "doc-concurrent".to_string();

        let mut handles = Vec::new();
        for i in 0..10 {
            let store = store.clone();
            let doc_id = doc_id.clone();
            handles.push(tokio::spawn(async move {
                store.create_chunks(vec![sample_chunk(&doc_id, i, ChunkType::Child)]).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let chunks = store.get_chunks(&doc_id).await.unwrap();
        assert_eq!(chunks.len(), 10);
    }
}
