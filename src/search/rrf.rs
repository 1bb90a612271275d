//! Reciprocal Rank Fusion of the keyword and vector rankers, with
//! intent-aware weights and per-source content bonuses.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::types::Chunk;

use super::keyword::KeywordQuery;
use super::synonyms::TECHNICAL_QUERY_PATTERNS;

const RRF_K: f64 = 60.0;

/// Which ranker(s) surfaced a given chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Keyword,
    Vector,
}

/// One fused, ranked search result.
#[derive(Debug, Clone)]
pub struct FusedHit {
    pub chunk: Chunk,
    pub score: f64,
    pub sources: Vec<Source>,
}

struct Accum {
    chunk: Chunk,
    score: f64,
    sources: Vec<Source>,
}

/// Fuses independently-ranked keyword and vector result lists into a single
/// top-`limit` list, sorted strictly descending by fused score.
pub fn fuse(
    keyword: Vec<(Chunk, f64)>,
    vector: Vec<(Chunk, f32)>,
    query: &KeywordQuery,
    limit: usize,
) -> Vec<FusedHit> {
    let technical = TECHNICAL_QUERY_PATTERNS.iter().any(|p| query.raw_lower().contains(p));
    let (keyword_weight, vector_weight) = if technical { (1.5, 0.8) } else { (1.0, 1.0) };

    let mut combined: HashMap<String, Accum> = HashMap::new();

    for (rank, (chunk, raw_score)) in keyword.into_iter().enumerate() {
        let mut contribution = keyword_weight / (RRF_K + (rank + 1) as f64);
        if raw_score > 10.0 {
            contribution += 0.05;
        }
        merge(&mut combined, chunk, contribution, Source::Keyword);
    }

    for (rank, (chunk, raw_score)) in vector.into_iter().enumerate() {
        let mut contribution = vector_weight / (RRF_K + (rank + 1) as f64);
        if raw_score as f64 > 0.85 {
            contribution += 0.05;
        }
        merge(&mut combined, chunk, contribution, Source::Vector);
    }

    if query.intent().is_command {
        let query_mentions_mlag = query.raw_lower().contains("mlag") || query.raw_lower().contains("bond mlag");
        for entry in combined.values_mut() {
            let lower = entry.chunk.content.to_lowercase();
            if lower.contains("nv set") || lower.contains("nv show") || lower.contains("```") {
                entry.score += 0.08;
            }
            if query_mentions_mlag && (lower.contains("mlag") || lower.contains("bond mlag")) {
                entry.score += 0.1;
            }
        }
    }

    let mut hits: Vec<FusedHit> = combined
        .into_values()
        .map(|a| FusedHit { chunk: a.chunk, score: a.score, sources: a.sources })
        .collect();
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    hits.truncate(limit);
    hits
}

fn merge(combined: &mut HashMap<String, Accum>, chunk: Chunk, contribution: f64, source: Source) {
    let entry = combined.entry(chunk.id.clone()).or_insert_with(|| Accum {
        chunk,
        score: 0.0,
        sources: Vec::new(),
    });
    entry.score += contribution;
    if !entry.sources.contains(&source) {
        entry.sources.push(source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChunkMetadata, ChunkType};
    use chrono::Utc;

    fn chunk(id: &str, content: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            document_id: "d1".into(),
            content: content.to_string(),
            chunk_index: 0,
            token_count: 1,
            chunk_type: ChunkType::Child,
            parent_id: None,
            embedding: None,
            metadata: ChunkMetadata::default(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn fused_results_are_sorted_descending_and_bounded_by_limit() {
        let query = KeywordQuery::new("mlag 怎么配置");
        let keyword = vec![
            (chunk("a", "nv set interface bond mlag-id 1"), 20.0),
            (chunk("b", "ospf area 0"), 5.0),
            (chunk("c", "vlan trunking basics"), 3.0),
        ];
        let vector = vec![(chunk("a", "nv set interface bond mlag-id 1"), 0.9)];

        let hits = fuse(keyword, vector, &query, 2);
        assert_eq!(hits.len(), 2);
        assert!(hits[0].score >= hits[1].score);
        assert_eq!(hits[0].chunk.id, "a");
        assert!(hits[0].sources.contains(&Source::Keyword));
        assert!(hits[0].sources.contains(&Source::Vector));
    }

    #[test]
    fn every_hit_has_a_nonempty_source_set() {
        let query = KeywordQuery::new("show interface");
        let keyword = vec![(chunk("x", "show interface swp1"), 8.0)];
        let hits = fuse(keyword, Vec::new(), &query, 5);
        assert_eq!(hits.len(), 1);
        assert!(!hits[0].sources.is_empty());
    }
}
