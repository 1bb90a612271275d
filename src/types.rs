//! Core data model: [`Document`], [`Chunk`], [`Task`] and their supporting types.
//!
//! These mirror the shapes persisted by [`crate::store`] and produced by
//! [`crate::chunking`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of an uploaded [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Processing,
    Ready,
    Error,
}

/// A single uploaded document and its ingestion state.
///
/// Invariant: `id` is globally unique and equals the stem of the shard file
/// (`data/chunks/<id>.json`) that owns this document's chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub filename: String,
    #[serde(rename = "fileType")]
    pub file_type: String,
    #[serde(rename = "fileSize")]
    pub file_size: u64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(rename = "contentPreview", default)]
    pub content_preview: String,
    #[serde(rename = "uploadedAt")]
    pub uploaded_at: DateTime<Utc>,
    pub status: DocumentStatus,
    #[serde(rename = "errorMessage", default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl Document {
    /// Creates a new document record in the `processing` state.
    pub fn new(filename: String, file_type: String, file_size: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            filename,
            file_type,
            file_size,
            category: None,
            content_preview: String::new(),
            uploaded_at: Utc::now(),
            status: DocumentStatus::Processing,
            error_message: None,
            user_id: None,
        }
    }
}

/// Whether a [`Chunk`] is a parent (context-expansion target) or a child
/// (retrieval unit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
    Parent,
    Child,
}

/// Optional structured metadata attached to a chunk by the chunker.
///
/// Modeled as a tagged record with all known fields rather than a loosely
/// typed map, with a flattened catch-all for anything not yet named here.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub breadcrumbs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(rename = "segmentIndex", default, skip_serializing_if = "Option::is_none")]
    pub segment_index: Option<usize>,
    #[serde(rename = "totalSegments", default, skip_serializing_if = "Option::is_none")]
    pub total_segments: Option<usize>,
    #[serde(rename = "childIndex", default, skip_serializing_if = "Option::is_none")]
    pub child_index: Option<usize>,
    #[serde(rename = "totalChildren", default, skip_serializing_if = "Option::is_none")]
    pub total_children: Option<usize>,
    #[serde(rename = "isCodeBlock", default, skip_serializing_if = "std::ops::Not::not")]
    pub is_code_block: bool,
    /// Unknown/forward-compatible fields preserved verbatim.
    #[serde(flatten, default, skip_serializing_if = "std::collections::BTreeMap::is_empty")]
    pub extra: std::collections::BTreeMap<String, String>,
}

/// A retrieval-sized span of document text, with an optional embedding.
///
/// Invariants: non-empty content, child→parent reference integrity, and a
/// fixed embedding dimensionality once any chunk in a document has one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Server-assigned if absent from the inbound JSON (see
    /// `ShardStore::create_chunks`, which backfills an empty id with a fresh
    /// UUID before persisting).
    #[serde(default)]
    pub id: String,
    #[serde(rename = "documentId")]
    pub document_id: String,
    pub content: String,
    #[serde(rename = "chunkIndex")]
    pub chunk_index: usize,
    #[serde(rename = "tokenCount")]
    pub token_count: usize,
    #[serde(rename = "chunkType")]
    pub chunk_type: ChunkType,
    #[serde(rename = "parentId", default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub metadata: ChunkMetadata,
    /// Defaults to the deserialization-time timestamp if absent from the
    /// inbound JSON, matching `createChunks`' "assign to anything missing
    /// it" contract for client-submitted chunks that never went through the
    /// chunker.
    #[serde(rename = "createdAt", default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Chunk {
    /// Returns `true` if this chunk carries a non-empty embedding vector.
    pub fn has_embedding(&self) -> bool {
        matches!(&self.embedding, Some(v) if !v.is_empty())
    }
}

/// Aggregate counts returned by [`crate::store::ShardStore::get_chunk_stats`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ChunkStats {
    pub total: usize,
    #[serde(rename = "parentCount")]
    pub parent_count: usize,
    #[serde(rename = "childCount")]
    pub child_count: usize,
    #[serde(rename = "withEmbedding")]
    pub with_embedding: usize,
    #[serde(rename = "requiringEmbedding")]
    pub requiring_embedding: usize,
}

/// Kind of background job tracked by the [`crate::tasks::TaskQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    GenerateEmbeddings,
}

/// Lifecycle status of a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Outcome recorded once an embedding task reaches a terminal state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskResult {
    #[serde(rename = "successCount")]
    pub success_count: usize,
    #[serde(rename = "failCount")]
    pub fail_count: usize,
    #[serde(rename = "actualSaved")]
    pub actual_saved: usize,
    #[serde(rename = "actualTotal")]
    pub actual_total: usize,
}

/// Flat, non-core configuration blob persisted at `settings.json`. Provider
/// API keys set here only take effect when the environment does not already
/// supply one; see [`crate::config::Config::apply_settings_fallback`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(rename = "apiKeys", default)]
    pub api_keys: std::collections::BTreeMap<String, String>,
    #[serde(flatten, default)]
    pub extra: std::collections::BTreeMap<String, serde_json::Value>,
}

/// A named grouping of documents, persisted at `categories.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// An in-memory job record. Never persisted to disk; a restart rediscovers
/// unfinished work by rescanning document status instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    #[serde(rename = "documentId")]
    pub document_id: String,
    pub status: TaskStatus,
    pub total: usize,
    pub current: usize,
    pub progress: u8,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
}

impl Task {
    /// Creates a new pending task for `document_id`.
    pub fn new_pending(document_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            task_type: TaskType::GenerateEmbeddings,
            document_id: document_id.into(),
            status: TaskStatus::Pending,
            total: 0,
            current: 0,
            progress: 0,
            created_at: now,
            updated_at: now,
            error: None,
            result: None,
        }
    }

    /// `true` once the task has reached `completed` or `failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, TaskStatus::Completed | TaskStatus::Failed)
    }
}
