//! Shared lightweight tokenizer used by the chunker (for `tokenCount`) and by
//! the keyword scorer (for query/content term extraction).
//!
//! Token runs are `[a-z0-9]+` (case-folded Latin/digit runs) or `\p{Han}+`
//! (contiguous runs of CJK ideographs, not one token per character) — an
//! approximation, not a model-accurate BPE count, but cheap enough to run on
//! every chunk and every query.

use std::sync::LazyLock;

use regex::Regex;

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9]+|\p{Han}+").expect("static token regex is valid"));

/// Returns every token run in `text`, in order, without any length filtering.
pub fn token_runs(text: &str) -> Vec<&str> {
    TOKEN_RE.find_iter(text).map(|m| m.as_str()).collect()
}

/// Approximate token count for a chunk of content (used for `Chunk::token_count`).
pub fn count_tokens(text: &str) -> usize {
    TOKEN_RE.find_iter(text).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_latin_runs_and_cjk_runs() {
        let tokens = token_runs("nv set interface swp1 配置接口");
        assert_eq!(tokens, vec!["nv", "set", "interface", "swp1", "配置接口"]);
    }

    #[test]
    fn separate_cjk_spans_stay_separate_runs() {
        let tokens = token_runs("链路聚合 怎么 配置");
        assert_eq!(tokens, vec!["链路聚合", "怎么", "配置"]);
    }

    #[test]
    fn empty_text_has_no_tokens() {
        assert_eq!(count_tokens(""), 0);
        assert_eq!(count_tokens("   \n\t"), 0);
    }
}
