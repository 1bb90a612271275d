//! Document ingestion orchestrator: validates an upload, creates the
//! `Document` record, then drives extraction, chunking and embedding in the
//! background.

use std::sync::Arc;

use crate::chunking::{self, chunk_sizes_for, DEFAULT_MAX_CHUNK_SIZE};
use crate::error::RagError;
use crate::providers::EmbeddingProvider;
use crate::store::ShardStore;
use crate::tasks::TaskQueue;
use crate::types::{Document, DocumentStatus};

/// File extensions accepted for upload.
const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "xls", "xlsx", "txt", "md"];

/// Extracts plain text from an uploaded file's raw bytes. Implemented
/// in-tree only for plain-text/Markdown passthrough; binary formats are a
/// pluggable seam for a future extractor, not built here.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, filename: &str, bytes: &[u8]) -> Result<String, RagError>;
}

/// Decodes UTF-8 text directly; any other extension is rejected with a
/// validation error rather than silently producing empty text.
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, filename: &str, bytes: &[u8]) -> Result<String, RagError> {
        match extension_of(filename) {
            Some(ext) if ext == "txt" || ext == "md" => String::from_utf8(bytes.to_vec())
                .map_err(|_| RagError::Validation(format!("{filename}: not valid UTF-8 text"))),
            Some(ext) => Err(RagError::Validation(format!(
                "no extractor registered for .{ext} files"
            ))),
            None => Err(RagError::Validation(format!("{filename}: missing file extension"))),
        }
    }
}

/// Drives the full upload → ready/error lifecycle.
#[derive(Clone)]
pub struct Orchestrator {
    store: ShardStore,
    tasks: TaskQueue,
    extractor: Arc<dyn TextExtractor>,
}

impl Orchestrator {
    pub fn new(store: ShardStore, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        let tasks = TaskQueue::new(store.clone(), embedder);
        Self { store, tasks, extractor: Arc::new(PlainTextExtractor) }
    }

    #[cfg(test)]
    fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn tasks(&self) -> &TaskQueue {
        &self.tasks
    }

    /// Validates `filename`, creates a `processing` Document, and spawns the
    /// background extract→chunk→embed pipeline. Returns the Document
    /// immediately so the caller can reply to the client without blocking.
    pub async fn ingest(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        category: Option<String>,
        user_id: Option<String>,
    ) -> Result<Document, RagError> {
        let ext = extension_of(filename)
            .ok_or_else(|| RagError::Validation(format!("{filename}: missing file extension")))?;
        if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(RagError::Validation(format!(
                "{filename}: unsupported file type .{ext}"
            )));
        }

        let filename = fix_mangled_cjk_filename(filename);
        let mut document = Document::new(filename, mime_for(&ext), bytes.len() as u64);
        document.category = category;
        document.user_id = user_id;
        let document = self.store.create_document(document).await?;

        let orchestrator = self.clone();
        let document_id = document.id.clone();
        tokio::spawn(async move { orchestrator.process(&document_id, bytes).await });

        Ok(document)
    }

    async fn process(&self, document_id: &str, bytes: Vec<u8>) {
        if let Err(err) = self.process_inner(document_id, bytes).await {
            tracing::warn!(document_id = %document_id, error = %err, "ingestion failed");
            let _ = self
                .store
                .update_document(document_id, |d| {
                    d.status = DocumentStatus::Error;
                    d.error_message = Some(err.to_string());
                })
                .await;
        }
    }

    async fn process_inner(&self, document_id: &str, bytes: Vec<u8>) -> Result<(), RagError> {
        let document = self
            .store
            .get_document(document_id)
            .await?
            .ok_or_else(|| RagError::NotFound(document_id.to_string()))?;

        let text = self.extractor.extract(&document.filename, &bytes)?;
        if text.trim().is_empty() {
            return Err(RagError::Validation("extracted text is empty".to_string()));
        }

        let (parent_size, child_size) = chunk_sizes_for(text.len());
        let chunks = chunking::chunk(document_id, &text, DEFAULT_MAX_CHUNK_SIZE, parent_size, child_size);
        self.store.create_chunks(chunks).await?;

        let preview: String = text.chars().take(500).collect();
        self.store
            .update_document(document_id, |d| d.content_preview = preview)
            .await?;

        let task = self.tasks.enqueue(document_id).await;
        loop {
            let current = self
                .tasks
                .get_task(&task.id)
                .await
                .ok_or_else(|| RagError::Internal("embedding task vanished from registry".to_string()))?;
            if current.is_terminal() {
                if current.status == crate::types::TaskStatus::Failed {
                    return Err(RagError::Provider(
                        current.error.unwrap_or_else(|| "embedding task failed".to_string()),
                    ));
                }
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }

        self.store
            .update_document(document_id, |d| d.status = DocumentStatus::Ready)
            .await?;
        Ok(())
    }
}

fn extension_of(filename: &str) -> Option<String> {
    filename.rsplit('.').next().map(|s| s.to_lowercase()).filter(|_| filename.contains('.'))
}

fn mime_for(ext: &str) -> String {
    match ext {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "txt" => "text/plain",
        "md" => "text/markdown",
        _ => "application/octet-stream",
    }
    .to_string()
}

/// Some upload clients send a filename that was UTF-8 originally but got
/// mangled through a Latin-1 round trip. Re-decoding the raw Latin-1 bytes as
/// UTF-8 recovers CJK characters when that succeeds.
fn fix_mangled_cjk_filename(filename: &str) -> String {
    let bytes: Vec<u8> = filename.chars().map(|c| c as u32).filter(|&c| c <= 0xFF).map(|c| c as u8).collect();
    if bytes.len() != filename.chars().count() {
        return filename.to_string();
    }
    match String::from_utf8(bytes) {
        Ok(candidate) if candidate.chars().any(is_cjk) => candidate,
        _ => filename.to_string(),
    }
}

fn is_cjk(c: char) -> bool {
    matches!(c as u32, 0x4E00..=0x9FFF | 0x3400..=0x4DBF)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockEmbeddingProvider;
    use tempfile::tempdir;

    #[tokio::test]
    async fn rejects_disallowed_extensions() {
        let dir = tempdir().unwrap();
        let store = ShardStore::new(dir.path());
        let orchestrator = Orchestrator::new(store, Arc::new(MockEmbeddingProvider::new()));
        let result = orchestrator.ingest("malware.exe", vec![1, 2, 3], None, None).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn markdown_upload_transitions_to_ready_with_chunks() {
        let dir = tempdir().unwrap();
        let store = ShardStore::new(dir.path());
        let orchestrator = Orchestrator::new(store.clone(), Arc::new(MockEmbeddingProvider::new()));

        let text = b"# A\ntext under A\n## B\ntext under B".to_vec();
        let document = orchestrator.ingest("runbook.md", text, None, None).await.unwrap();
        assert_eq!(document.status, DocumentStatus::Processing);

        let document = wait_for_ready_or_error(&store, &document.id).await;
        assert_eq!(document.status, DocumentStatus::Ready);

        let chunks = store.get_chunks(&document.id).await.unwrap();
        let parents = chunks.iter().filter(|c| c.chunk_type == crate::types::ChunkType::Parent).count();
        assert!(parents >= 2);
    }

    #[tokio::test]
    async fn empty_extracted_text_marks_document_errored() {
        struct EmptyExtractor;
        impl TextExtractor for EmptyExtractor {
            fn extract(&self, _filename: &str, _bytes: &[u8]) -> Result<String, RagError> {
                Ok(String::new())
            }
        }

        let dir = tempdir().unwrap();
        let store = ShardStore::new(dir.path());
        let orchestrator = Orchestrator::new(store.clone(), Arc::new(MockEmbeddingProvider::new()))
            .with_extractor(Arc::new(EmptyExtractor));

        let document = orchestrator.ingest("notes.txt", b"ignored".to_vec(), None, None).await.unwrap();
        let document = wait_for_ready_or_error(&store, &document.id).await;
        assert_eq!(document.status, DocumentStatus::Error);
        assert!(document.error_message.is_some());
    }

    async fn wait_for_ready_or_error(store: &ShardStore, document_id: &str) -> Document {
        for _ in 0..200 {
            if let Some(document) = store.get_document(document_id).await.unwrap() {
                if document.status != DocumentStatus::Processing {
                    return document;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("document {document_id} never left the processing state");
    }
}
