//! Notebook cell segmentation.
//!
//! The notebook page the model writes is Markdown with ```` ```python ````
//! blocks embedded in it. Each such block becomes a code cell and the prose
//! between blocks becomes narrative cells, in source order.
//!
//! Matching is lexical and non-greedy: the first ```` ``` ```` after an
//! opening ```` ```python ```` closes the block, even when that backtick run
//! sits inside a string literal in the code. Fences tagged with any other
//! language (```` ```bash ````, ```` ```python3 ````) are not boundaries and
//! stay verbatim inside the surrounding narrative cell.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Opening token of a code block that becomes a code cell.
pub const FENCE_OPEN: &str = "```python";
/// Closing token of a code block.
pub const FENCE_CLOSE: &str = "```";

static RE_PYTHON_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```python\b.*?```").unwrap());

/// Kind of a notebook cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    Code,
    Narrative,
}

/// One segment of a notebook document. Content is trimmed and never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "content", rename_all = "lowercase")]
pub enum Cell {
    /// Python source, without the surrounding fence tokens.
    Code(String),
    /// Markdown prose.
    Narrative(String),
}

impl Cell {
    pub fn kind(&self) -> CellKind {
        match self {
            Cell::Code(_) => CellKind::Code,
            Cell::Narrative(_) => CellKind::Narrative,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Cell::Code(s) | Cell::Narrative(s) => s,
        }
    }

    /// Render the cell back to Markdown, re-wrapping code in its fence.
    pub fn to_markdown(&self) -> String {
        match self {
            Cell::Code(code) => format!("{FENCE_OPEN}\n{code}\n{FENCE_CLOSE}"),
            Cell::Narrative(text) => text.clone(),
        }
    }
}

/// Split a repaired notebook document into code and narrative cells.
///
/// Total: whitespace-only input yields no cells, input without python fences
/// yields a single narrative cell.
pub fn segment(text: &str) -> Vec<Cell> {
    let mut cells = Vec::new();
    let mut cursor = 0;

    for block in RE_PYTHON_BLOCK.find_iter(text) {
        push_narrative(&mut cells, &text[cursor..block.start()]);

        let span = block.as_str();
        let code = span[FENCE_OPEN.len()..span.len() - FENCE_CLOSE.len()].trim();
        if !code.is_empty() {
            cells.push(Cell::Code(code.to_string()));
        }
        cursor = block.end();
    }
    push_narrative(&mut cells, &text[cursor..]);

    cells
}

fn push_narrative(cells: &mut Vec<Cell>, piece: &str) {
    let piece = piece.trim();
    if !piece.is_empty() {
        cells.push(Cell::Narrative(piece.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn narrative(s: &str) -> Cell {
        Cell::Narrative(s.into())
    }

    fn code(s: &str) -> Cell {
        Cell::Code(s.into())
    }

    #[test]
    fn test_prose_code_prose() {
        let cells = segment("intro\n```python\nprint(1)\n```\noutro");
        assert_eq!(cells, vec![narrative("intro"), code("print(1)"), narrative("outro")]);
    }

    #[test]
    fn test_only_code() {
        assert_eq!(segment("```python\ncode\n```"), vec![code("code")]);
    }

    #[test]
    fn test_empty_input() {
        assert!(segment("").is_empty());
        assert!(segment("   ").is_empty());
        assert!(segment("\n\n\t").is_empty());
    }

    #[test]
    fn test_no_fences_is_one_narrative_cell() {
        let cells = segment("  # Heading\n\nSome prose.  ");
        assert_eq!(cells, vec![narrative("# Heading\n\nSome prose.")]);
    }

    #[test]
    fn test_other_language_fence_stays_in_narrative() {
        let text = "Run:\n```bash\npip install x\n```\nThen\n```python\nimport x\n```";
        let cells = segment(text);
        assert_eq!(
            cells,
            vec![
                narrative("Run:\n```bash\npip install x\n```\nThen"),
                code("import x"),
            ]
        );
    }

    #[test]
    fn test_python3_tag_is_not_a_boundary() {
        let text = "```python3\nx = 1\n```";
        assert_eq!(segment(text), vec![narrative(text)]);
    }

    #[test]
    fn test_adjacent_blocks() {
        let cells = segment("```python\na = 1\n``````python\nb = 2\n```");
        assert_eq!(cells, vec![code("a = 1"), code("b = 2")]);
    }

    #[test]
    fn test_empty_code_block_dropped() {
        assert!(segment("```python\n\n```").is_empty());
        assert_eq!(segment("a\n```python```\nb"), vec![narrative("a"), narrative("b")]);
    }

    #[test]
    fn test_unclosed_fence_is_narrative() {
        let text = "intro\n```python\nx = 1";
        assert_eq!(segment(text), vec![narrative(text)]);
    }

    #[test]
    fn test_backticks_inside_code_close_early() {
        let cells = segment("```python\ns = '```'\n```");
        assert_eq!(cells, vec![code("s = '"), narrative("'\n```")]);
    }

    #[test]
    fn test_details_solution_blocks() {
        let text = "## Problem 1\n\n<details>\n<summary>Show Solution</summary>\n\n\
```python\ndef solve():\n    return 42\n```\n\n</details>";
        let cells = segment(text);
        assert_eq!(cells.len(), 3);
        assert_eq!(cells[0].kind(), CellKind::Narrative);
        assert!(cells[0].content().ends_with("<summary>Show Solution</summary>"));
        assert_eq!(cells[1], code("def solve():\n    return 42"));
        assert_eq!(cells[2], narrative("</details>"));
    }

    #[test]
    fn test_rewrapping_cells_reconstructs_source() {
        let text = "intro\n\n```python\nx = 1\n```\n\nmiddle\n\n```python\ny = 2\n```";
        let rebuilt: Vec<String> = segment(text).iter().map(Cell::to_markdown).collect();
        assert_eq!(rebuilt.join("\n\n"), text);
    }

    #[test]
    fn test_cell_serialises_with_kind_tag() {
        let json = serde_json::to_string(&code("x")).unwrap();
        assert_eq!(json, r#"{"kind":"code","content":"x"}"#);
    }
}
