//! Markdown-semantic-aware parent/child chunker.
//!
//! Public entry point: [`chunk`]. The pipeline runs block parsing → section
//! tree → per-section materialization → parent formation → child formation,
//! with a structure-less fallback for plain paragraphs.

pub mod blocks;
pub mod sections;
mod split;

use chrono::Utc;
use uuid::Uuid;

use crate::tokenize::count_tokens;
use crate::types::{Chunk, ChunkMetadata, ChunkType};

use blocks::Block;
use sections::{build_section_tree, materialize_sections, SectionContent};

/// Default parent/child target sizes for documents at or under the large-doc
/// threshold.
pub const DEFAULT_PARENT_SIZE: usize = 2000;
pub const DEFAULT_CHILD_SIZE: usize = 600;
/// Larger targets used once the source text exceeds [`LARGE_DOC_THRESHOLD_BYTES`].
pub const LARGE_DOC_PARENT_SIZE: usize = 3000;
pub const LARGE_DOC_CHILD_SIZE: usize = 800;
/// Hard cap on any single chunk's content length, regardless of target size.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 4000;
/// Text above this size (bytes) switches to the larger parent/child targets.
pub const LARGE_DOC_THRESHOLD_BYTES: usize = 500 * 1024;

/// Chooses `(parent_size, child_size)` by text length.
pub fn chunk_sizes_for(text_len_bytes: usize) -> (usize, usize) {
    if text_len_bytes > LARGE_DOC_THRESHOLD_BYTES {
        (LARGE_DOC_PARENT_SIZE, LARGE_DOC_CHILD_SIZE)
    } else {
        (DEFAULT_PARENT_SIZE, DEFAULT_CHILD_SIZE)
    }
}

/// Parses `text` into an ordered parent/child chunk list for `document_id`.
///
/// Parents always precede their children; `chunk_index` is a single
/// monotonic counter assigned over the whole returned list. Returns an empty
/// list only if `text` is empty or whitespace-only.
///
/// A document with no headings and no other non-paragraph structure
/// degrades to the same section machinery with an empty breadcrumb path,
/// rather than a separate fallback chunker.
pub fn chunk(
    document_id: &str,
    text: &str,
    max_chunk_size: usize,
    parent_size: usize,
    child_size: usize,
) -> Vec<Chunk> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let blocks = blocks::parse_blocks(text);
    let has_headings = blocks.iter().any(|b| matches!(b, Block::Heading { .. }));
    let has_other_structure = blocks
        .iter()
        .any(|b| !matches!(b, Block::Paragraph { .. } | Block::Heading { .. }));

    let sections: Vec<SectionContent> = if has_headings || has_other_structure {
        let tree = build_section_tree(blocks);
        materialize_sections(&tree)
    } else {
        vec![SectionContent {
            breadcrumbs: Vec::new(),
            content: text.to_string(),
            blocks,
        }]
    };

    let mut index = 0usize;
    let mut out = Vec::new();
    for section in &sections {
        build_section_chunks(
            document_id,
            section,
            max_chunk_size,
            parent_size,
            child_size,
            &mut index,
            &mut out,
        );
    }
    out
}

fn build_section_chunks(
    document_id: &str,
    section: &SectionContent,
    max_chunk_size: usize,
    parent_size: usize,
    child_size: usize,
    index: &mut usize,
    out: &mut Vec<Chunk>,
) {
    let mut segments = split::split_blocks(&section.blocks, parent_size, max_chunk_size);
    if segments.is_empty() && !section.content.trim().is_empty() {
        segments.push(section.content.clone());
    }
    let total = segments.len();

    for (seg_idx, body) in segments.into_iter().enumerate() {
        let body = body.trim().to_string();
        if body.is_empty() {
            continue;
        }

        let banner = breadcrumb_banner(&section.breadcrumbs, seg_idx, total);
        let parent_content = format!("{banner}{body}");
        let parent_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut parent_meta = ChunkMetadata {
            breadcrumbs: section.breadcrumbs.clone(),
            header: section.breadcrumbs.last().cloned(),
            is_code_block: is_single_code_block(&body),
            ..Default::default()
        };
        if total > 1 {
            parent_meta.segment_index = Some(seg_idx);
            parent_meta.total_segments = Some(total);
        }

        out.push(Chunk {
            id: parent_id.clone(),
            document_id: document_id.to_string(),
            content: parent_content,
            chunk_index: *index,
            token_count: count_tokens(&body),
            chunk_type: ChunkType::Parent,
            parent_id: None,
            embedding: None,
            metadata: parent_meta,
            created_at: now,
        });
        *index += 1;

        let children = split::split_text(&body, child_size, max_chunk_size);
        let total_children = children.len();
        let last_crumb = section.breadcrumbs.last().cloned();

        for (child_idx, child_body) in children.into_iter().enumerate() {
            let child_body = child_body.trim().to_string();
            if child_body.is_empty() {
                continue;
            }
            let content = if child_idx == 0 {
                child_body.clone()
            } else if let Some(crumb) = &last_crumb {
                format!("[...{crumb}]\n\n{child_body}")
            } else {
                child_body.clone()
            };

            out.push(Chunk {
                id: Uuid::new_v4().to_string(),
                document_id: document_id.to_string(),
                content,
                chunk_index: *index,
                token_count: count_tokens(&child_body),
                chunk_type: ChunkType::Child,
                parent_id: Some(parent_id.clone()),
                embedding: None,
                metadata: ChunkMetadata {
                    breadcrumbs: section.breadcrumbs.clone(),
                    child_index: Some(child_idx),
                    total_children: Some(total_children),
                    is_code_block: is_single_code_block(&child_body),
                    ..Default::default()
                },
                created_at: now,
            });
            *index += 1;
        }
    }
}

fn breadcrumb_banner(breadcrumbs: &[String], seg_idx: usize, total: usize) -> String {
    if breadcrumbs.is_empty() {
        return String::new();
    }
    let path = breadcrumbs.join(" > ");
    if total > 1 {
        format!("[{path}]({}/{})\n\n", seg_idx + 1, total)
    } else {
        format!("[{path}]\n\n")
    }
}

fn is_single_code_block(body: &str) -> bool {
    let trimmed = body.trim();
    (trimmed.starts_with("```") || trimmed.starts_with("~~~")) && trimmed.ends_with(|c| c != '\n')
}
