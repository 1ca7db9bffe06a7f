//! Markdown repair: deterministic cleanup of LLM-generated study notes.
//!
//! ## Why is repair necessary?
//!
//! Small local models in particular produce Markdown that is *informationally*
//! fine but structurally broken:
//!
//! - headings glued to the paragraph above (`text\n# Heading`)
//! - list items jammed onto one line (`1.first2.second`)
//! - tables and code fences with no blank line before them
//! - `<details>` blocks run together with surrounding prose
//! - long runs of empty lines
//!
//! This module applies seven small line/regex passes that only ever insert
//! (or collapse) whitespace. The multiset of non-whitespace characters is
//! never changed, so no content is lost.
//!
//! ## Pass Order
//!
//! The order is part of the contract. Headings are spaced before lists so
//! that a bullet directly under a heading is not separated twice, tables are
//! spaced before fences, and blank runs are collapsed last so every earlier
//! insertion is bounded.
//!
//! Passes 2–4 skip the inside of fenced code blocks; `# comment` lines in a
//! Python cell are not headings.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Apply every repair pass to raw model output.
///
/// Total over all inputs: never fails, and the result always ends in exactly
/// one `\n`.
///
/// Passes (applied in order):
/// 1. Normalise line endings (CRLF → LF)
/// 2. Blank line before and after each heading
/// 3. Split jammed numbered/bullet list items
/// 4. Blank line before the first row of a table
/// 5. Blank line around fenced code blocks
/// 6. Blank lines around `<details>` / `</summary>` / `</details>`
/// 7. Collapse runs of 3+ blank lines to 2
pub fn repair(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = space_headings(&s);
    let s = unjam_list_items(&s);
    let s = space_tables(&s);
    let s = space_code_fences(&s);
    let s = space_details_blocks(&s);
    let s = collapse_blank_runs(&s);
    let out = finish(&s);
    debug!("Repaired markdown: {} → {} bytes", input.len(), out.len());
    out
}

// ── Shared line helpers ──────────────────────────────────────────────────────

static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6}\s").unwrap());

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn is_heading(line: &str) -> bool {
    RE_HEADING.is_match(line.trim())
}

fn is_fence(line: &str) -> bool {
    line.trim().starts_with("```")
}

/// Position of a line scanner relative to triple-backtick fences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fence {
    Outside,
    Inside,
}

impl Fence {
    /// State after scanning `line`.
    fn after(self, line: &str) -> Self {
        match (self, is_fence(line)) {
            (Fence::Outside, true) => Fence::Inside,
            (Fence::Inside, true) => Fence::Outside,
            (state, false) => state,
        }
    }
}

// ── Pass 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n")
}

// ── Pass 2: Heading spacing ──────────────────────────────────────────────────

fn space_headings(input: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut fence = Fence::Outside;
    let mut after_heading = false;

    for line in input.split('\n') {
        if fence == Fence::Outside && is_heading(line) {
            if out.last().is_some_and(|prev| !is_blank(prev)) {
                out.push("");
            }
            out.push(line);
            after_heading = true;
            continue;
        }

        if after_heading && !is_blank(line) {
            out.push("");
        }
        after_heading = false;
        fence = fence.after(line);
        out.push(line);
    }

    out.join("\n")
}

// ── Pass 3: List-item de-jamming ─────────────────────────────────────────────

static RE_NUMBER_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9]+)\.(\s)?").unwrap());
static RE_LEADING_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([0-9]+)\.").unwrap());
static RE_BULLET_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*[-*]\s").unwrap());
static RE_NUMBERED_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*[0-9]+\.\s").unwrap());

fn unjam_list_items(input: &str) -> String {
    let s = split_inline_markers(input);
    space_bullet_lists(&s)
}

/// Insert a newline before list markers glued to the preceding content.
/// Lines containing `|` (table rows) are left alone.
fn split_inline_markers(input: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut fence = Fence::Outside;

    for line in input.split('\n') {
        if fence == Fence::Outside && !is_fence(line) && !line.contains('|') {
            let line = split_numbered_markers(line);
            out.push(split_dash_bullets(&line));
        } else {
            out.push(line.to_string());
        }
        fence = fence.after(line);
    }

    out.join("\n")
}

/// `step one.2. step two` → `step one.\n2. step two`.
///
/// A marker followed by whitespace is split whenever it is glued to a
/// non-digit character. A marker with no space after it (`1.first2.second`)
/// is only split when it continues the numbering the line started with, so
/// `file2.txt` or `v1.2` stay intact.
fn split_numbered_markers(line: &str) -> String {
    let mut next_item = RE_LEADING_NUMBER
        .captures(line)
        .and_then(|caps| caps[1].parse::<u64>().ok())
        .map(|n| n + 1);
    let mut out = String::with_capacity(line.len() + 8);
    let mut last = 0;

    for caps in RE_NUMBER_MARKER.captures_iter(line) {
        let Some(marker) = caps.get(0) else { continue };
        let glued = line[..marker.start()]
            .chars()
            .next_back()
            .is_some_and(|c| !c.is_whitespace() && !c.is_ascii_digit());
        if !glued {
            continue;
        }

        let number = caps[1].parse::<u64>().ok();
        let spaced = caps.get(2).is_some();
        let continues_list = number.is_some()
            && number == next_item
            && line[marker.end()..].starts_with(char::is_alphabetic);

        if spaced || continues_list {
            out.push_str(&line[last..marker.start()]);
            out.push('\n');
            last = marker.start();
            if let Some(n) = number {
                next_item = Some(n + 1);
            }
        }
    }

    out.push_str(&line[last..]);
    out
}

/// `Key points:- first- second` → one `- ` bullet per line.
///
/// Only `-` bullets are split inline; a `*` glued to a word is almost always
/// an emphasis delimiter (`*italic* text`).
fn split_dash_bullets(line: &str) -> String {
    let mut out = String::with_capacity(line.len() + 8);
    let mut prev: Option<char> = None;

    for (i, c) in line.char_indices() {
        if c == '-' {
            let rest = &line[i + 1..];
            let glued = prev.is_some_and(|p| p.is_alphanumeric() || ".:;!?)".contains(p));
            if glued && rest.starts_with(' ') && !rest.trim().is_empty() {
                out.push('\n');
            }
        }
        out.push(c);
        prev = Some(c);
    }

    out
}

/// Put a blank line between a paragraph line and the bullet list that
/// directly follows it. Items inside a list are not spread apart.
fn space_bullet_lists(input: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut fence = Fence::Outside;

    for line in input.split('\n') {
        if fence == Fence::Outside && RE_BULLET_LINE.is_match(line) {
            if let Some(prev) = out.last() {
                let starts_list = !is_blank(prev)
                    && !prev.starts_with(char::is_whitespace)
                    && !RE_BULLET_LINE.is_match(prev)
                    && !RE_NUMBERED_LINE.is_match(prev)
                    && !is_fence(prev);
                if starts_list {
                    out.push("");
                }
            }
        }
        fence = fence.after(line);
        out.push(line);
    }

    out.join("\n")
}

// ── Pass 4: Table spacing ────────────────────────────────────────────────────

static RE_TABLE_ROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^|]+\|[^|]+\|").unwrap());

fn is_table_row(line: &str) -> bool {
    if line.matches('|').count() < 4 {
        return false;
    }
    let trimmed = line.trim();
    trimmed.starts_with('|') || RE_TABLE_ROW.is_match(trimmed)
}

fn space_tables(input: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut fence = Fence::Outside;

    for line in input.split('\n') {
        if fence == Fence::Outside && is_table_row(line) {
            if let Some(prev) = out.last() {
                if !is_blank(prev) && !prev.contains('|') && !is_heading(prev) {
                    out.push("");
                }
            }
        }
        fence = fence.after(line);
        out.push(line);
    }

    out.join("\n")
}

// ── Pass 5: Code-fence spacing ───────────────────────────────────────────────

/// Unbalanced fences leave the scanner `Inside` at end of input; nothing is
/// closed or removed.
fn space_code_fences(input: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut fence = Fence::Outside;

    for line in input.split('\n') {
        if is_fence(line) {
            if fence == Fence::Outside && out.last().is_some_and(|prev| !is_blank(prev)) {
                out.push("");
            }
            out.push(line);
            fence = fence.after(line);
            continue;
        }

        let after_close = fence == Fence::Outside && out.last().is_some_and(|prev| is_fence(prev));
        if after_close && !is_blank(line) {
            out.push("");
        }
        out.push(line);
    }

    out.join("\n")
}

// ── Pass 6: Collapsible-details spacing ──────────────────────────────────────

static RE_DETAILS_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\S)(<details>)").unwrap());
static RE_DETAILS_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(</details>)(\S)").unwrap());
static RE_SUMMARY_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(</summary>)(\S)").unwrap());

fn space_details_blocks(input: &str) -> String {
    let s = RE_DETAILS_OPEN.replace_all(input, "${1}\n\n${2}");
    let s = RE_DETAILS_CLOSE.replace_all(&s, "${1}\n\n${2}");
    RE_SUMMARY_CLOSE.replace_all(&s, "${1}\n\n${2}").to_string()
}

// ── Pass 7: Blank-run collapsing ─────────────────────────────────────────────

/// Four or more newlines, counting whitespace-only lines as empty.
static RE_BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n(?:[^\S\n]*\n){3,}").unwrap());

fn collapse_blank_runs(input: &str) -> String {
    RE_BLANK_RUN.replace_all(input, "\n\n\n").to_string()
}

// ── Final step ───────────────────────────────────────────────────────────────

fn finish(input: &str) -> String {
    format!("{}\n", input.trim())
}

// ── Tests ────────────────────────────────────────────────────────────────────
