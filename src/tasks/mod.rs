//! In-memory job registry and embedding pipeline.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use tokio::sync::Mutex;

use crate::error::RagError;
use crate::providers::EmbeddingProvider;
use crate::store::ShardStore;
use crate::types::{Task, TaskResult, TaskStatus};

/// Tasks kept beyond this count (oldest terminal first) are evicted.
const TASK_CAP: usize = 100;
/// Chunk content is truncated to this many characters before embedding.
const CONTENT_TRUNCATE_CHARS: usize = 2000;
/// Number of concurrent embedding requests per batch.
const BATCH_SIZE: usize = 5;
/// Pending writes are flushed to the shard store once this many accumulate.
const FLUSH_THRESHOLD: usize = 10;
/// Delay between batches to respect provider rate limits.
const BATCH_DELAY: Duration = Duration::from_millis(200);
/// Delay before the restart-recovery scan runs at server start.
const RECOVERY_DELAY: Duration = Duration::from_secs(5);

/// Owns the in-memory task registry and drives the embedding worker loop.
///
/// Cloning shares the same registry and store handle (both already
/// `Arc`-backed), mirroring how `ShardStore` itself is cheaply cloneable.
#[derive(Clone)]
pub struct TaskQueue {
    store: ShardStore,
    embedder: Arc<dyn EmbeddingProvider>,
    tasks: Arc<Mutex<HashMap<String, Task>>>,
}

impl TaskQueue {
    pub fn new(store: ShardStore, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            store,
            embedder,
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn get_task(&self, task_id: &str) -> Option<Task> {
        self.tasks.lock().await.get(task_id).cloned()
    }

    /// All tasks (any status) created for `document_id`, newest first.
    pub async fn tasks_for_document(&self, document_id: &str) -> Vec<Task> {
        let tasks = self.tasks.lock().await;
        let mut matching: Vec<Task> = tasks.values().filter(|t| t.document_id == document_id).cloned().collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching
    }

    /// Creates a pending task for `document_id` and spawns its worker loop in
    /// the background, returning the task record immediately so callers never
    /// block an HTTP response on embedding generation.
    pub async fn enqueue(&self, document_id: &str) -> Task {
        let task = Task::new_pending(document_id);
        self.insert(task.clone()).await;

        let queue = self.clone();
        let task_id = task.id.clone();
        tokio::spawn(async move { queue.run(&task_id).await });

        task
    }

    async fn insert(&self, task: Task) {
        let mut tasks = self.tasks.lock().await;
        tasks.insert(task.id.clone(), task);
        evict_if_needed(&mut tasks);
    }

    async fn update(&self, task_id: &str, patch: impl FnOnce(&mut Task)) {
        let mut tasks = self.tasks.lock().await;
        if let Some(task) = tasks.get_mut(task_id) {
            patch(task);
            task.updated_at = Utc::now();
        }
    }

    /// Runs the embedding worker loop for an already-enqueued task.
    async fn run(&self, task_id: &str) {
        let document_id = match self.get_task(task_id).await {
            Some(task) => task.document_id,
            None => return,
        };

        self.update(task_id, |t| t.status = TaskStatus::Processing).await;

        match self.process(task_id, &document_id).await {
            Ok(result) => {
                self.update(task_id, |t| {
                    t.status = TaskStatus::Completed;
                    t.progress = 100;
                    t.result = Some(result);
                })
                .await;
            }
            Err(err) => {
                self.update(task_id, |t| {
                    t.status = TaskStatus::Failed;
                    t.error = Some(err.to_string());
                })
                .await;
            }
        }
    }

    async fn process(&self, task_id: &str, document_id: &str) -> Result<TaskResult, RagError> {
        let chunks = self.store.get_chunks(document_id).await?;
        let work_list: Vec<(String, String)> = chunks
            .iter()
            .filter(|c| !c.has_embedding() && c.chunk_type == crate::types::ChunkType::Child)
            .map(|c| (c.id.clone(), truncate_content(&c.content)))
            .collect();

        let total = work_list.len();
        self.update(task_id, |t| t.total = total).await;

        if total == 0 {
            return Ok(TaskResult { success_count: 0, fail_count: 0, actual_saved: 0, actual_total: 0 });
        }

        if !self.embedder.is_configured() {
            return Err(RagError::Provider("no embedding provider API key configured".into()));
        }

        let mut success_count = 0usize;
        let mut fail_count = 0usize;
        let mut pending: Vec<(String, Vec<f32>)> = Vec::new();
        let mut current = 0usize;

        for batch in work_list.chunks(BATCH_SIZE) {
            let results = join_all(batch.iter().map(|(chunk_id, content)| async move {
                let embedding = self.embedder.embed_one(content).await;
                (chunk_id.clone(), embedding)
            }))
            .await;

            for (chunk_id, embedding) in results {
                current += 1;
                match embedding {
                    Ok(vector) => {
                        success_count += 1;
                        pending.push((chunk_id, vector));
                    }
                    Err(err) => {
                        fail_count += 1;
                        tracing::warn!(chunk_id = %chunk_id, error = %err, "embedding request failed, isolated to this chunk");
                    }
                }
            }

            let is_last_batch = current >= total;
            if pending.len() >= FLUSH_THRESHOLD || (is_last_batch && !pending.is_empty()) {
                self.flush(document_id, &mut pending).await;
            }

            let progress = ((current as f64 / total as f64) * 100.0) as u8;
            self.update(task_id, |t| {
                t.current = current;
                t.progress = progress;
            })
            .await;

            if !is_last_batch {
                tokio::time::sleep(BATCH_DELAY).await;
            }
        }

        if !pending.is_empty() {
            self.flush(document_id, &mut pending).await;
        }

        let refreshed = self.store.get_chunks(document_id).await?;
        let refreshed_children = refreshed.iter().filter(|c| c.chunk_type == crate::types::ChunkType::Child);
        let actual_total = refreshed_children.clone().count();
        let actual_saved = refreshed_children.filter(|c| c.has_embedding()).count();

        Ok(TaskResult { success_count, fail_count, actual_saved, actual_total })
    }

    /// Flushes `pending` via the single-shard fast path, falling back to
    /// per-chunk writes on failure. Clears `pending` either way.
    async fn flush(&self, document_id: &str, pending: &mut Vec<(String, Vec<f32>)>) {
        if pending.is_empty() {
            return;
        }
        let batch = std::mem::take(pending);
        if let Err(err) = self.store.update_chunk_embeddings(document_id, &batch).await {
            tracing::warn!(document_id = %document_id, error = %err, "batch flush failed, falling back to per-chunk writes");
            for (chunk_id, embedding) in batch {
                if let Err(err) = self.store.update_chunk_embedding(&chunk_id, embedding).await {
                    tracing::warn!(chunk_id = %chunk_id, error = %err, "per-chunk embedding write failed");
                }
            }
        }
    }

    /// Scans for documents left in `processing` with unfinished embedding work
    /// and re-enqueues them, after a startup grace period. Intended to be
    /// spawned once at server start.
    pub async fn recover_after_restart(&self) {
        tokio::time::sleep(RECOVERY_DELAY).await;

        let documents = match self.store.list_documents().await {
            Ok(docs) => docs,
            Err(err) => {
                tracing::warn!(error = %err, "restart recovery scan failed to list documents");
                return;
            }
        };

        for document in documents {
            if document.status != crate::types::DocumentStatus::Processing {
                continue;
            }
            let chunks = match self.store.get_chunks(&document.id).await {
                Ok(chunks) => chunks,
                Err(_) => continue,
            };
            if chunks.iter().any(|c| !c.has_embedding() && c.chunk_type == crate::types::ChunkType::Child) {
                tracing::info!(document_id = %document.id, "restart recovery re-enqueuing embedding task");
                self.enqueue(&document.id).await;
            }
        }
    }
}

fn truncate_content(content: &str) -> String {
    let compressed = content.replace(['\n', '\r'], " ");
    compressed.chars().take(CONTENT_TRUNCATE_CHARS).collect()
}

fn evict_if_needed(tasks: &mut HashMap<String, Task>) {
    if tasks.len() <= TASK_CAP {
        return;
    }
    let mut terminal: Vec<(String, chrono::DateTime<Utc>)> = tasks
        .iter()
        .filter(|(_, t)| t.is_terminal())
        .map(|(id, t)| (id.clone(), t.updated_at))
        .collect();
    terminal.sort_by_key(|(_, updated_at)| *updated_at);

    let overflow = tasks.len() - TASK_CAP;
    for (id, _) in terminal.into_iter().take(overflow) {
        tasks.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking;
    use crate::providers::MockEmbeddingProvider;
    use tempfile::tempdir;

    async fn wait_for_terminal(queue: &TaskQueue, task_id: &str) -> Task {
        for _ in 0..200 {
            if let Some(task) = queue.get_task(task_id).await {
                if task.is_terminal() {
                    return task;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task {task_id} did not reach a terminal state in time");
    }

    #[tokio::test]
    async fn embeds_every_chunk_missing_a_vector() {
        let dir = tempdir().unwrap();
        let store = ShardStore::new(dir.path());
        let doc_id = "doc-embed".to_string();
        let chunks = chunking::chunk(&doc_id, "# A\nnv set interface swp1 link state up\n## B\nnv show interface", 4000, 2000, 600);
        store.create_chunks(chunks).await.unwrap();

        let queue = TaskQueue::new(store.clone(), Arc::new(MockEmbeddingProvider::new()));
        let task = queue.enqueue(&doc_id).await;
        let finished = wait_for_terminal(&queue, &task.id).await;

        assert_eq!(finished.status, TaskStatus::Completed);
        let result = finished.result.unwrap();
        assert!(result.success_count > 0);
        assert_eq!(result.fail_count, 0);

        let refreshed = store.get_chunks(&doc_id).await.unwrap();
        assert!(refreshed.iter().filter(|c| c.chunk_type == crate::types::ChunkType::Child).all(|c| c.has_embedding()));
    }

    #[tokio::test]
    async fn per_chunk_failures_are_isolated_and_counted() {
        let dir = tempdir().unwrap();
        let store = ShardStore::new(dir.path());
        let doc_id = "doc-partial".to_string();
        let chunks = chunking::chunk(
            &doc_id,
            "# A\nBOOM this one fails\n## B\nthis one succeeds just fine",
            4000,
            2000,
            600,
        );
        store.create_chunks(chunks).await.unwrap();

        let embedder = MockEmbeddingProvider::new().failing_on("BOOM");
        let queue = TaskQueue::new(store.clone(), Arc::new(embedder));
        let task = queue.enqueue(&doc_id).await;
        let finished = wait_for_terminal(&queue, &task.id).await;

        assert_eq!(finished.status, TaskStatus::Completed);
        let result = finished.result.unwrap();
        assert!(result.fail_count >= 1);
        assert!(result.success_count >= 1);
    }

    #[tokio::test]
    async fn missing_api_key_fails_the_task() {
        let dir = tempdir().unwrap();
        let store = ShardStore::new(dir.path());
        let doc_id = "doc-nokey".to_string();
        let chunks = chunking::chunk(&doc_id, "# A\nsome content to embed here", 4000, 2000, 600);
        store.create_chunks(chunks).await.unwrap();

        struct Unconfigured;
        #[async_trait::async_trait]
        impl EmbeddingProvider for Unconfigured {
            async fn embed(&self, _inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
                unreachable!("is_configured should short-circuit before any embed call")
            }
            fn is_configured(&self) -> bool {
                false
            }
        }

        let queue = TaskQueue::new(store, Arc::new(Unconfigured));
        let task = queue.enqueue(&doc_id).await;
        let finished = wait_for_terminal(&queue, &task.id).await;
        assert_eq!(finished.status, TaskStatus::Failed);
        assert!(finished.error.is_some());
    }

    #[tokio::test]
    async fn no_chunks_need_embedding_completes_immediately_with_zero_counts() {
        let dir = tempdir().unwrap();
        let store = ShardStore::new(dir.path());
        let doc_id = "doc-empty".to_string();

        let queue = TaskQueue::new(store, Arc::new(MockEmbeddingProvider::new()));
        let task = queue.enqueue(&doc_id).await;
        let finished = wait_for_terminal(&queue, &task.id).await;

        assert_eq!(finished.status, TaskStatus::Completed);
        let result = finished.result.unwrap();
        assert_eq!(result.success_count, 0);
        assert_eq!(result.actual_total, 0);
    }

    #[tokio::test]
    async fn deleting_the_document_mid_task_does_not_panic() {
        let dir = tempdir().unwrap();
        let store = ShardStore::new(dir.path());
        let doc_id = "doc-deleted".to_string();
        let chunks = chunking::chunk(&doc_id, "# A\nsome content that will be embedded", 4000, 2000, 600);
        store.create_chunks(chunks).await.unwrap();

        let queue = TaskQueue::new(store.clone(), Arc::new(MockEmbeddingProvider::new()));
        let task = queue.enqueue(&doc_id).await;
        store.delete_document(&doc_id).await.unwrap();
        let finished = wait_for_terminal(&queue, &task.id).await;
        assert_eq!(finished.status, TaskStatus::Completed);
    }
}
