//! BM25-like keyword scorer with synonym expansion and intent bonuses.

use std::sync::LazyLock;

use regex::Regex;

use crate::tokenize::token_runs;
use crate::types::Chunk;

use super::synonyms::{self, QueryIntent, TROUBLE_KEYWORDS};

static TECHNICAL_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+$").expect("static technical-token regex is valid"));
static NV_COMMAND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(nv|show|netq|vtysh)\s+(config|show|ip|interface|platform)")
        .expect("static nv-command regex is valid")
});
static CONCEPT_SHAPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bis a\b|是一种|指的是").expect("static concept-shape regex is valid"));

/// A query tokenized, synonym-expanded and intent-classified once up front
/// and reused to score every chunk.
pub struct KeywordQuery {
    raw_lower: String,
    expanded_tokens: Vec<String>,
    intent: QueryIntent,
}

impl KeywordQuery {
    pub fn new(query: &str) -> Self {
        let raw_lower = query.to_lowercase();
        let base_tokens = tokenize_query(&raw_lower);

        let mut expanded: Vec<String> = base_tokens.clone();
        for token in &base_tokens {
            for syn in synonyms::expand(token) {
                let syn = syn.to_lowercase();
                if !expanded.contains(&syn) {
                    expanded.push(syn);
                }
            }
        }

        Self {
            intent: QueryIntent::classify(&raw_lower),
            raw_lower,
            expanded_tokens: expanded,
        }
    }

    pub fn intent(&self) -> QueryIntent {
        self.intent
    }

    pub fn raw_lower(&self) -> &str {
        &self.raw_lower
    }

    /// +2 per expanded token that occurs (substring) in `filename`.
    pub fn filename_bonus(&self, filename: &str) -> f64 {
        let filename_lower = filename.to_lowercase();
        self.expanded_tokens
            .iter()
            .filter(|t| filename_lower.contains(t.as_str()))
            .count() as f64
            * 2.0
    }

    /// Scores one chunk's content against this query, combining the
    /// document bonus, substring/frequency scoring and intent bonuses.
    /// Returns `None` when the score would be `<= 0`.
    pub fn score(&self, content: &str, document_bonus: f64) -> Option<f64> {
        let lower = content.to_lowercase();
        let mut score = document_bonus;

        if !self.raw_lower.is_empty() && lower.contains(&self.raw_lower) {
            score += 10.0;
        }

        let mut matched_count = 0usize;
        for token in &self.expanded_tokens {
            let freq = lower.matches(token.as_str()).count();
            if freq == 0 {
                continue;
            }
            matched_count += 1;
            let weight = if TECHNICAL_TOKEN_RE.is_match(token) { 3.0 } else { 1.0 };
            score += (1.0 + (freq as f64).ln()) * weight;
        }

        if matched_count >= 2 {
            score += matched_count as f64 * 1.5;
        }

        if score > 2.0 {
            score += self.intent_bonus(&lower);
        }

        if score > 0.0 {
            Some(score)
        } else {
            None
        }
    }

    fn intent_bonus(&self, lower_content: &str) -> f64 {
        let mut bonus = 0.0;

        if self.intent.is_command {
            if lower_content.contains("nv config") || lower_content.contains("nv show") || lower_content.contains("nv set") {
                bonus += 10.0;
            } else if NV_COMMAND_RE.is_match(lower_content) {
                bonus += 10.0;
            } else if lower_content.contains("```") {
                bonus += 10.0;
            }

            if self.raw_lower.contains("show") && lower_content.contains("show") {
                bonus += 5.0;
            }
            if self.raw_lower.contains("config") && lower_content.contains("config") {
                bonus += 5.0;
            }
            if self.raw_lower.contains("set") && lower_content.contains("set") {
                bonus += 8.0;
            }
            if (self.raw_lower.contains("mlag") || self.raw_lower.contains("bond"))
                && lower_content.contains("mlag")
                && lower_content.contains("bond")
            {
                bonus += 15.0;
            }
        }

        if self.intent.is_concept {
            if CONCEPT_SHAPE_RE.is_match(lower_content) {
                bonus += 15.0;
            }
            if lower_content.trim_start().starts_with('#') {
                bonus += 10.0;
            }
        }

        if self.intent.is_troubleshooting && TROUBLE_KEYWORDS.iter().any(|k| lower_content.contains(k)) {
            bonus += 15.0;
        }

        bonus
    }
}

/// Tokenizes a lower-cased query into `[a-z0-9]+`/`\p{Han}` runs, dropping
/// single-Latin-char tokens while keeping single CJK tokens.
fn tokenize_query(lower_query: &str) -> Vec<String> {
    token_runs(lower_query)
        .into_iter()
        .filter(|t| {
            let mut chars = t.chars();
            let first = chars.next();
            let second = chars.next();
            !(second.is_none() && first.is_some_and(|c| c.is_ascii_alphanumeric()))
        })
        .map(|t| t.to_string())
        .collect()
}

/// Bounded accumulator implementing a periodic-truncation memory bound:
/// once the buffer exceeds ~50x `limit` it is truncated back down to the
/// top ~25x `limit`, so an unbounded corpus scan never grows without limit.
pub struct ScoredBuffer {
    limit: usize,
    items: Vec<(Chunk, f64)>,
}

impl ScoredBuffer {
    pub fn new(limit: usize) -> Self {
        Self { limit: limit.max(1), items: Vec::new() }
    }

    pub fn push(&mut self, chunk: Chunk, score: f64) {
        self.items.push((chunk, score));
        if self.items.len() > self.limit * 50 {
            self.sort();
            self.items.truncate(self.limit * 25);
        }
    }

    fn sort(&mut self) {
        self.items.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    }

    pub fn finish(mut self) -> Vec<(Chunk, f64)> {
        self.sort();
        self.items.truncate(self.limit);
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChunkMetadata, ChunkType};
    use chrono::Utc;

    fn chunk(content: &str) -> Chunk {
        Chunk {
            id: "c1".into(),
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
    fn raw_query_substring_scores_highest_component() {
        let q = KeywordQuery::new("configure swp1");
        let score = q.score("please configure swp1 before continuing", 0.0).unwrap();
        assert!(score >= 10.0);
    }

    #[test]
    fn no_matching_terms_returns_none() {
        let q = KeywordQuery::new("xyzzy plugh");
        assert!(q.score("completely unrelated content about fruit", 0.0).is_none());
    }

    #[test]
    fn command_intent_boosts_nv_set_chunks() {
        let q = KeywordQuery::new("mlag 怎么配置");
        let mlag_chunk = chunk("nv set interface bond mlag-id 1");
        let ospf_chunk = chunk("ospf area 0 configuration reference");
        let mlag_score = q.score(&mlag_chunk.content, 0.0).unwrap_or(0.0);
        let ospf_score = q.score(&ospf_chunk.content, 0.0).unwrap_or(0.0);
        assert!(mlag_score > ospf_score);
    }

    #[test]
    fn filename_bonus_counts_expanded_token_substrings() {
        let q = KeywordQuery::new("mlag");
        let bonus = q.filename_bonus("mlag-configuration-guide.md");
        assert!(bonus > 0.0);
    }
}
