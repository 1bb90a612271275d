//! Paragraph/sentence splitting into parent and child segments, respecting
//! protected blocks (fenced code, tables) and list-item granularity.

use std::sync::LazyLock;

use regex::Regex;

use super::blocks::{self, Block};

/// Matches one sentence, terminated by a Latin or Chinese sentence-final
/// punctuation mark, or the remainder of the paragraph if none is found.
static SENTENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^。！？.!?\n]*[。！？.!?]+").expect("static sentence regex is valid"));

struct Atom {
    text: String,
    protected: bool,
}

fn atoms_from_blocks(blocks: &[Block]) -> Vec<Atom> {
    blocks
        .iter()
        .filter(|b| !b.raw_text().trim().is_empty())
        .flat_map(list_item_atoms_or_self)
        .collect()
}

/// A `Block::List` expands into one atom per list item (see
/// `blocks::split_list_items`); every other block yields a single atom.
fn list_item_atoms_or_self(block: &Block) -> Vec<Atom> {
    if let Block::List { raw } = block {
        blocks::split_list_items(raw)
            .into_iter()
            .map(|item| Atom { text: item, protected: true })
            .collect()
    } else {
        vec![Atom { text: block.raw_text(), protected: block.is_protected() }]
    }
}

/// Splits pre-parsed section blocks into segments no larger than `target`
/// characters, never dividing a protected block even past `hard_cap`.
/// Used for parent-chunk formation.
pub fn split_blocks(blocks: &[Block], target: usize, hard_cap: usize) -> Vec<String> {
    pack(atoms_from_blocks(blocks), target, hard_cap)
}

/// Re-parses already-rendered text (e.g. a parent chunk's body) and splits it
/// the same way. Used for child-chunk formation: the text was
/// already emitted by [`split_blocks`], so re-running the block parser
/// recovers fenced-code/table protection without threading the original
/// `Block` values through.
pub fn split_text(text: &str, target: usize, hard_cap: usize) -> Vec<String> {
    let parsed = blocks::parse_blocks(text);
    let atoms: Vec<Atom> = parsed
        .iter()
        .filter(|b| !b.raw_text().trim().is_empty())
        .flat_map(|b| {
            if let Block::List { raw } = b {
                blocks::split_list_items(raw)
                    .into_iter()
                    .map(|item| Atom { text: item, protected: true })
                    .collect()
            } else {
                let raw = b.raw_text();
                let protected = b.is_protected() || blocks::contains_table_sentinel(&raw);
                vec![Atom { text: raw, protected }]
            }
        })
        .collect();
    pack(atoms, target, hard_cap)
}

fn pack(atoms: Vec<Atom>, target: usize, hard_cap: usize) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();

    for atom in &atoms {
        if atom.protected {
            append_atomic(&mut current, &mut segments, &atom.text, hard_cap);
            if current.chars().count() >= target {
                flush(&mut current, &mut segments);
            }
            continue;
        }
        for piece in split_into_pieces(&atom.text, target, hard_cap) {
            append_piece(&mut current, &mut segments, &piece, target);
        }
    }

    flush(&mut current, &mut segments);
    segments
}

fn flush(current: &mut String, segments: &mut Vec<String>) {
    if !current.trim().is_empty() {
        segments.push(std::mem::take(current));
    } else {
        current.clear();
    }
}

/// Appends a protected (unsplittable) atom, flushing the current segment
/// first only if the atom would otherwise push it past `hard_cap`.
fn append_atomic(current: &mut String, segments: &mut Vec<String>, text: &str, hard_cap: usize) {
    if !current.is_empty() && current.chars().count() + text.chars().count() + 2 > hard_cap {
        flush(current, segments);
    }
    if !current.is_empty() {
        current.push_str("\n\n");
    }
    current.push_str(text);
}

fn append_piece(current: &mut String, segments: &mut Vec<String>, piece: &str, target: usize) {
    if piece.trim().is_empty() {
        return;
    }
    if !current.is_empty() && current.chars().count() + piece.chars().count() + 2 > target {
        flush(current, segments);
    }
    if !current.is_empty() {
        current.push_str("\n\n");
    }
    current.push_str(piece);
    if current.chars().count() >= target {
        flush(current, segments);
    }
}

/// Splits one non-protected atom's text into pieces no larger than `target`,
/// falling back to sentence splitting and finally a hard character cut for
/// paragraphs with no sentence boundaries at all.
fn split_into_pieces(text: &str, target: usize, hard_cap: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    for para in text.split("\n\n") {
        let para = para.trim();
        if para.is_empty() {
            continue;
        }
        if para.chars().count() <= target {
            pieces.push(para.to_string());
            continue;
        }

        let mut sentences: Vec<&str> = SENTENCE_RE.find_iter(para).map(|m| m.as_str()).collect();
        if sentences.is_empty() {
            sentences.push(para);
        }

        let mut buf = String::new();
        for sent in sentences {
            let sent = sent.trim();
            if sent.is_empty() {
                continue;
            }
            if sent.chars().count() > hard_cap {
                if !buf.is_empty() {
                    pieces.push(std::mem::take(&mut buf));
                }
                pieces.extend(hard_cut(sent, hard_cap));
                continue;
            }
            if !buf.is_empty() && buf.chars().count() + sent.chars().count() + 1 > target {
                pieces.push(std::mem::take(&mut buf));
            }
            if !buf.is_empty() {
                buf.push(' ');
            }
            buf.push_str(sent);
        }
        if !buf.is_empty() {
            pieces.push(buf);
        }
    }
    pieces
}

/// Last-resort character-boundary cut for a single sentence that exceeds
/// `hard_cap` with no smaller boundary to split on.
fn hard_cut(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(size.max(1)).map(|c| c.iter().collect()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::blocks::parse_blocks;

    #[test]
    fn short_content_becomes_one_segment() {
        let blocks = parse_blocks("a short paragraph");
        let segments = split_blocks(&blocks, 2000, 4000);
        assert_eq!(segments.len(), 1);
    }

    #[test]
    fn protected_code_block_never_splits() {
        let code = format!("```rust\n{}\n```", "x".repeat(5000));
        let blocks = parse_blocks(&code);
        let segments = split_blocks(&blocks, 2000, 4000);
        assert_eq!(segments.len(), 1);
        assert!(segments[0].contains(&"x".repeat(5000)));
    }

    #[test]
    fn long_paragraph_splits_at_sentence_boundaries() {
        let para = "First sentence here. Second sentence here. ".repeat(100);
        let blocks = parse_blocks(&para);
        let segments = split_blocks(&blocks, 200, 4000);
        assert!(segments.len() > 1);
        for seg in &segments {
            assert!(seg.chars().count() <= 4000);
        }
    }

    #[test]
    fn oversized_list_item_stays_intact() {
        let long_item = format!("- {}", "word ".repeat(500));
        let text = format!("- short item\n{long_item}\n- another short item");
        let blocks = parse_blocks(&text);
        let segments = split_blocks(&blocks, 200, 4000);
        assert!(segments.iter().any(|s| s.contains(long_item.trim())));
    }

    #[test]
    fn list_items_split_at_item_boundaries_not_sentences() {
        let text = "- First item. Has two sentences.\n- Second item. Also two.\n- Third item. Last one.";
        let blocks = parse_blocks(text);
        let segments = split_blocks(&blocks, 30, 4000);
        for seg in &segments {
            assert!(
                seg.trim_start().starts_with('-'),
                "segment should start on an item boundary: {seg:?}"
            );
        }
    }
}
