//! Single-pass line classifier: turns a text blob into an ordered list of
//! [`Block`]s.

/// A classified span of contiguous lines.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading { level: u8, text: String },
    /// A fenced code block. `raw` includes the opening/closing fence lines
    /// (or just the opening fence if the fence was never closed before EOF).
    CodeBlock { raw: String },
    /// A pipe-delimited Markdown table (header + separator + rows) or, when
    /// header/row cell counts mismatch, the raw `col | col | …` text.
    Table { rows: Vec<Vec<String>>, raw: String },
    /// A raw `<table>...</table>` block, treated atomically like `Table`.
    HtmlTable { raw: String },
    List { raw: String },
    Blockquote { raw: String },
    HorizontalRule,
    Paragraph { raw: String },
}

impl Block {
    /// Code blocks and tables are "protected": the splitter in
    /// [`crate::chunking::split`] never divides them, even past the target size.
    pub fn is_protected(&self) -> bool {
        matches!(
            self,
            Block::CodeBlock { .. } | Block::Table { .. } | Block::HtmlTable { .. }
        )
    }

    /// Whether this block is a fenced code block (drives `ChunkMetadata::is_code_block`
    /// and the keyword scorer's "chunk contains a fenced code block" bonus).
    pub fn is_code_block(&self) -> bool {
        matches!(self, Block::CodeBlock { .. })
    }

    /// The block's raw textual content, as it should appear in reassembled output.
    pub fn raw_text(&self) -> String {
        match self {
            Block::Heading { level, text } => format!("{} {}", "#".repeat(*level as usize), text),
            Block::CodeBlock { raw } => raw.clone(),
            Block::Table { raw, .. } => raw.clone(),
            Block::HtmlTable { raw } => raw.clone(),
            Block::List { raw } => raw.clone(),
            Block::Blockquote { raw } => raw.clone(),
            Block::HorizontalRule => "---".to_string(),
            Block::Paragraph { raw } => raw.clone(),
        }
    }
}

/// Parses `text` into an ordered sequence of blocks.
///
/// An iteration guard bounds the scan to `2 * line_count` steps, protecting
/// against malformed input that could otherwise stall the line cursor.
pub fn parse_blocks(text: &str) -> Vec<Block> {
    let lines: Vec<&str> = text.lines().collect();
    let guard = lines.len().saturating_mul(2).max(1);
    let mut blocks = Vec::new();
    let mut i = 0usize;
    let mut iterations = 0usize;

    while i < lines.len() {
        iterations += 1;
        if iterations > guard {
            tracing::warn!(
                line_count = lines.len(),
                "chunker block parser exceeded iteration guard, truncating"
            );
            break;
        }

        let line = lines[i];
        let trimmed = line.trim_start();

        if trimmed.is_empty() {
            i += 1;
            continue;
        }

        if let Some((level, title)) = heading(trimmed) {
            blocks.push(Block::Heading { level, text: title });
            i += 1;
            continue;
        }

        if let Some(fence) = fence_marker(trimmed) {
            let start = i;
            i += 1;
            while i < lines.len() && !is_closing_fence(lines[i], &fence) {
                i += 1;
            }
            let end = if i < lines.len() { i } else { i - 1 };
            i = (i + 1).min(lines.len());
            blocks.push(Block::CodeBlock {
                raw: lines[start..=end].join("\n"),
            });
            continue;
        }

        if is_html_table_start(trimmed) {
            let start = i;
            i += 1;
            while i < lines.len() && !lines[i].to_lowercase().contains("</table>") {
                i += 1;
            }
            let end = if i < lines.len() { i } else { i - 1 };
            i = (i + 1).min(lines.len());
            blocks.push(Block::HtmlTable {
                raw: lines[start..=end].join("\n"),
            });
            continue;
        }

        if is_table_row(trimmed) && lines.get(i + 1).is_some_and(|l| is_table_separator(l)) {
            let start = i;
            while i < lines.len() && is_table_row(lines[i].trim_start()) {
                i += 1;
            }
            let raw = lines[start..i].join("\n");
            let rows = parse_table_rows(&lines[start..i]);
            blocks.push(Block::Table { rows, raw });
            continue;
        }

        if is_horizontal_rule(trimmed) {
            blocks.push(Block::HorizontalRule);
            i += 1;
            continue;
        }

        if trimmed.starts_with('>') {
            let start = i;
            while i < lines.len() && lines[i].trim_start().starts_with('>') {
                i += 1;
            }
            blocks.push(Block::Blockquote {
                raw: lines[start..i].join("\n"),
            });
            continue;
        }

        if is_list_item_start(trimmed) {
            let start = i;
            i += 1;
            while i < lines.len() {
                let next = lines[i];
                let next_trim = next.trim_start();
                if next_trim.is_empty() {
                    // A blank line only continues the list if another list
                    // item or indented continuation follows.
                    let continues = lines
                        .get(i + 1)
                        .is_some_and(|l| is_list_item_start(l.trim_start()) || starts_indented(l));
                    if !continues {
                        break;
                    }
                    i += 1;
                    continue;
                }
                if is_list_item_start(next_trim) || starts_indented(next) {
                    i += 1;
                    continue;
                }
                break;
            }
            blocks.push(Block::List {
                raw: lines[start..i].join("\n"),
            });
            continue;
        }

        // Paragraph: consume contiguous non-blank lines not matched above.
        let start = i;
        i += 1;
        while i < lines.len() && !lines[i].trim().is_empty() {
            let t = lines[i].trim_start();
            if heading(t).is_some()
                || fence_marker(t).is_some()
                || is_html_table_start(t)
                || is_horizontal_rule(t)
                || t.starts_with('>')
                || is_list_item_start(t)
            {
                break;
            }
            i += 1;
        }
        blocks.push(Block::Paragraph {
            raw: lines[start..i].join("\n"),
        });
    }

    blocks
}

fn heading(trimmed: &str) -> Option<(u8, String)> {
    if !trimmed.starts_with('#') {
        return None;
    }
    let hashes = trimmed.chars().take_while(|&c| c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &trimmed[hashes..];
    if !rest.starts_with(' ') && !rest.is_empty() {
        return None;
    }
    Some((hashes as u8, rest.trim().to_string()))
}

fn fence_marker(trimmed: &str) -> Option<String> {
    for marker in ["```", "~~~"] {
        if trimmed.starts_with(marker) {
            let len = trimmed.chars().take_while(|&c| c == marker.chars().next().unwrap()).count();
            return Some(marker.chars().next().unwrap().to_string().repeat(len));
        }
    }
    None
}

fn is_closing_fence(line: &str, fence: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with(fence) && trimmed.trim_end().chars().all(|c| c == fence.chars().next().unwrap())
}

fn is_html_table_start(trimmed: &str) -> bool {
    trimmed.to_lowercase().starts_with("<table")
}

fn is_table_row(trimmed: &str) -> bool {
    !trimmed.is_empty() && trimmed.contains('|') && !trimmed.starts_with('>')
}

fn is_table_separator(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() || !trimmed.contains('-') {
        return false;
    }
    trimmed
        .chars()
        .all(|c| matches!(c, '-' | ':' | '|' | ' '))
}

fn parse_table_rows(lines: &[&str]) -> Vec<Vec<String>> {
    // lines[0] = header, lines[1] = separator, lines[2..] = data rows.
    let split_cells = |line: &str| -> Vec<String> {
        line.trim()
            .trim_matches('|')
            .split('|')
            .map(|cell| cell.trim().to_string())
            .collect()
    };
    let mut rows = Vec::new();
    if let Some(header) = lines.first() {
        rows.push(split_cells(header));
    }
    for line in lines.iter().skip(2) {
        rows.push(split_cells(line));
    }
    rows
}

fn is_horizontal_rule(trimmed: &str) -> bool {
    let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.len() < 3 {
        return false;
    }
    let first = compact.chars().next().unwrap();
    matches!(first, '-' | '*' | '_') && compact.chars().all(|c| c == first)
}

fn is_list_item_start(trimmed: &str) -> bool {
    if trimmed.starts_with("- ") || trimmed.starts_with("* ") || trimmed.starts_with("+ ") {
        return true;
    }
    let digits: String = trimmed.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return false;
    }
    let rest = &trimmed[digits.len()..];
    rest.starts_with(". ") || rest.starts_with(") ")
}

fn starts_indented(line: &str) -> bool {
    line.starts_with("  ") || line.starts_with('\t')
}

/// Splits a `Block::List`'s raw text back into its individual items (each
/// item's continuation lines included). Each item is treated as atomic by
/// the splitter in [`crate::chunking::split`]: a single oversized item is
/// kept intact rather than broken at a sentence or hard-cut boundary.
pub(crate) fn split_list_items(raw: &str) -> Vec<String> {
    let lines: Vec<&str> = raw.lines().collect();
    let mut items = Vec::new();
    let mut start = 0usize;
    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim_start();
        if idx > 0 && is_list_item_start(trimmed) {
            let item = lines[start..idx].join("\n");
            if !item.trim().is_empty() {
                items.push(item);
            }
            start = idx;
        }
    }
    let tail = lines[start..].join("\n");
    if !tail.trim().is_empty() {
        items.push(tail);
    }
    if items.is_empty() {
        items.push(raw.to_string());
    }
    items
}

/// A rendered table loses its `|` syntax once re-emitted as plain text, so
/// the child-chunk
/// re-parser in [`crate::chunking::split`] recognizes its sentinel markers
/// instead to keep treating it as protected.
pub(crate) fn contains_table_sentinel(text: &str) -> bool {
    text.contains("[表格开始]") || text.contains("[表格结束]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_heading_levels() {
        let blocks = parse_blocks("# Title\n## Sub\ntext");
        assert!(matches!(blocks[0], Block::Heading { level: 1, .. }));
        assert!(matches!(blocks[1], Block::Heading { level: 2, .. }));
        assert!(matches!(blocks[2], Block::Paragraph { .. }));
    }

    #[test]
    fn unterminated_fence_absorbs_tail() {
        let blocks = parse_blocks("```rust\nfn main() {}\nlet x = 1;");
        assert_eq!(blocks.len(), 1);
        assert!(matches!(&blocks[0], Block::CodeBlock { raw } if raw.contains("let x = 1;")));
    }

    #[test]
    fn table_with_separator_is_atomic() {
        let text = "| a | b |\n|---|---|\n| 1 | 2 |";
        let blocks = parse_blocks(text);
        assert_eq!(blocks.len(), 1);
        match &blocks[0] {
            Block::Table { rows, .. } => {
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[0], vec!["a", "b"]);
                assert_eq!(rows[1], vec!["1", "2"]);
            }
            other => panic!("expected table, got {other:?}"),
        }
    }

    #[test]
    fn list_with_blank_continuation_stays_one_block() {
        let text = "- item one\n- item two\n  continued\n\nnext paragraph";
        let blocks = parse_blocks(text);
        assert!(matches!(blocks[0], Block::List { .. }));
        assert!(matches!(blocks[1], Block::Paragraph { .. }));
    }

    #[test]
    fn empty_input_has_no_blocks() {
        assert!(parse_blocks("").is_empty());
        assert!(parse_blocks("   \n  \n").is_empty());
    }
}
