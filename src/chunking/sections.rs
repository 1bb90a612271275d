//! Section tree construction and per-section materialization. Builds the
//! breadcrumb/section tree used for per-section chunking.

use super::blocks::Block;

/// Arena node for one (sub)section.
///
/// Parent/child relationships are indices into [`SectionTree::nodes`] rather
/// than owned `Box`es: arena-style indices avoid one allocation per node and
/// keep the tree `Clone`-able without deep-copying child pointers.
#[derive(Debug)]
struct SectionNode {
    heading: Option<(u8, String)>,
    own_blocks: Vec<Block>,
    children: Vec<usize>,
}

/// A parsed, nested section tree. Index `0` is always the anonymous root
/// covering any content that appears before the first heading.
pub struct SectionTree {
    nodes: Vec<SectionNode>,
}

/// Breadcrumb path plus the body blocks of one section, ready for
/// atom-based parent/child splitting (see [`crate::chunking::split`]).
#[derive(Debug, Clone, PartialEq)]
pub struct SectionContent {
    pub breadcrumbs: Vec<String>,
    /// Rendered whole-section text (heading + blocks), used only for the
    /// paragraph-fallback path and tests; splitting uses `blocks` directly
    /// so protected spans survive.
    pub content: String,
    pub blocks: Vec<Block>,
}

/// Builds the section tree from a flat block list.
///
/// A level-1 heading opens a new top-level section (closing any open
/// subsections); any deeper heading opens a subsection nested under the
/// current (sub)section, popping back up to its own level first. Non-heading
/// blocks attach to whichever section is current.
pub fn build_section_tree(blocks: Vec<Block>) -> SectionTree {
    let mut nodes = vec![SectionNode {
        heading: None,
        own_blocks: Vec::new(),
        children: Vec::new(),
    }];
    // (heading_level, node_index); level 0 marks the anonymous root.
    let mut stack: Vec<(u8, usize)> = vec![(0, 0)];

    for block in blocks {
        if let Block::Heading { level, text } = &block {
            let level = *level;
            if level == 1 {
                stack.truncate(1);
            } else {
                while stack.len() > 1 && stack.last().unwrap().0 >= level {
                    stack.pop();
                }
            }
            let parent = stack.last().unwrap().1;
            let idx = nodes.len();
            nodes.push(SectionNode {
                heading: Some((level, text.clone())),
                own_blocks: Vec::new(),
                children: Vec::new(),
            });
            nodes[parent].children.push(idx);
            stack.push((level, idx));
        } else {
            let current = stack.last().unwrap().1;
            nodes[current].own_blocks.push(block);
        }
    }

    SectionTree { nodes }
}

/// Flattens the tree into document-ordered [`SectionContent`] entries,
/// skipping sections whose own body is empty (pure heading containers whose
/// children carry all of the text).
pub fn materialize_sections(tree: &SectionTree) -> Vec<SectionContent> {
    let mut out = Vec::new();
    visit(tree, 0, Vec::new(), &mut out);
    out
}

fn visit(tree: &SectionTree, idx: usize, breadcrumbs: Vec<String>, out: &mut Vec<SectionContent>) {
    let node = &tree.nodes[idx];
    let mut own_breadcrumbs = breadcrumbs.clone();
    if let Some((_, title)) = &node.heading {
        own_breadcrumbs.push(title.clone());
    }

    if !node.own_blocks.is_empty() {
        let mut parts = Vec::with_capacity(node.own_blocks.len() + 1);
        if let Some((level, title)) = &node.heading {
            parts.push(format!("{} {}", "#".repeat(*level as usize), title));
        }
        for block in &node.own_blocks {
            parts.push(render_block(block));
        }
        out.push(SectionContent {
            breadcrumbs: own_breadcrumbs.clone(),
            content: parts.join("\n\n"),
            blocks: node.own_blocks.clone(),
        });
    }

    for &child in &node.children {
        visit(tree, child, own_breadcrumbs.clone(), out);
    }
}

/// Renders a single block's text, re-emitting tables in the sentinel
/// "row N: col=val, …" form consumed by the keyword scorer.
fn render_block(block: &Block) -> String {
    match block {
        Block::Table { rows, raw } => render_table(rows).unwrap_or_else(|| raw.clone()),
        other => other.raw_text(),
    }
}

fn render_table(rows: &[Vec<String>]) -> Option<String> {
    let header = rows.first()?;
    let data_rows = &rows[1.min(rows.len())..];
    if data_rows.iter().any(|row| row.len() != header.len()) {
        return None;
    }

    let mut lines = vec!["[表格开始]".to_string()];
    for (n, row) in data_rows.iter().enumerate() {
        let cells: Vec<String> = header
            .iter()
            .zip(row.iter())
            .map(|(col, val)| format!("{col}={val}"))
            .collect();
        lines.push(format!("row {}: {}", n + 1, cells.join(", ")));
    }
    lines.push("[表格结束]".to_string());
    Some(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::blocks::parse_blocks;

    #[test]
    fn headings_partition_into_sections_with_breadcrumbs() {
        let blocks = parse_blocks("# A\ntext under A\n## B\ntext under B");
        let tree = build_section_tree(blocks);
        let sections = materialize_sections(&tree);

        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].breadcrumbs, vec!["A".to_string()]);
        assert!(sections[0].content.contains("text under A"));
        assert_eq!(sections[1].breadcrumbs, vec!["A".to_string(), "B".to_string()]);
        assert!(sections[1].content.contains("text under B"));
    }

    #[test]
    fn content_before_any_heading_is_anonymous() {
        let blocks = parse_blocks("intro text\n# A\nbody");
        let tree = build_section_tree(blocks);
        let sections = materialize_sections(&tree);

        assert_eq!(sections[0].breadcrumbs, Vec::<String>::new());
        assert!(sections[0].content.contains("intro text"));
    }

    #[test]
    fn mismatched_table_falls_back_to_pipe_form() {
        let blocks = parse_blocks("| a | b |\n|---|---|\n| 1 |");
        let tree = build_section_tree(blocks);
        let sections = materialize_sections(&tree);
        assert!(sections[0].content.contains('|'));
        assert!(!sections[0].content.contains("[表格开始]"));
    }
}
