//! Prompt templates for every generation stage.
//!
//! Each template carries a `{source}` placeholder (and `{question}` for Q&A)
//! filled by the `*_prompt` builders below. The heading structure asked for
//! here is what the repair and segmentation passes expect to see; change a
//! heading level and the notebook cells shift with it.

/// Theory page: concept overview through key takeaways.
pub const THEORY_PROMPT: &str = r#"You are an expert computer science educator. Given the following lecture transcript, produce a comprehensive theory page in Markdown.

Structure your response EXACTLY as follows (use these heading levels):

# Concept Overview
Write a 2-3 sentence plain-English summary of the main topic.

# Step-by-Step Explanation
Provide a numbered breakdown of the concept. Include a concrete worked example with actual values.

# Common Mistakes
List the top 3-5 common pitfalls students make with this topic. For each, explain the mistake and the correction.

# Complexity Analysis
Provide a Markdown table with columns: Operation | Time Complexity | Space Complexity | Justification.
Cover all key operations discussed.

# Key Takeaways
Provide 3-5 bullet points summarising the most important facts for exam revision.

---
TRANSCRIPT:
{source}
---

Respond only with the Markdown content. Do not include any preamble or meta-commentary."#;

/// Notebook page: implementation, dry run, practice problems, edge cases.
pub const NOTEBOOK_PROMPT: &str = r#"You are an expert programming instructor. Given the following lecture transcript, produce an interactive code notebook in Markdown.

Structure your response EXACTLY as follows (use these heading levels):

# Code Implementation
Provide clean, fully-commented Python code that implements the concept from the lecture.
Wrap code in triple-backtick fenced blocks with the language tag (```python).

# Dry Run Trace
Show a step-by-step trace of the algorithm on a concrete small example.
Use a Markdown table with columns: Step | Variable States | Explanation.

# Practice Problems

## Problem 1 (Easy)
State the problem clearly.

<details>
<summary>Show Solution</summary>

```python
# solution code here
```

</details>

## Problem 2 (Medium)
State the problem clearly, with a collapsible solution as above.

## Problem 3 (Hard)
State the problem clearly, with a collapsible solution as above.

# Edge Cases
Provide a Markdown table with columns: Edge Case | Example Input | Expected Behaviour.

---
TRANSCRIPT:
{source}
---

Respond only with the Markdown content. Do not include any preamble or meta-commentary."#;

/// Shared formatting rules for the document prompts.
const FORMATTING_RULES: &str = r#"IMPORTANT FORMATTING RULES:
- Put a blank line before and after every heading (#, ##, ###).
- Put a blank line before and after every table.
- Put a blank line before and after every code block.
- Use proper newlines between paragraphs.
- Use bullet points (- item) with each item on its own line."#;

/// Document summary: overview, per-section summaries, conclusion.
pub const SUMMARY_PROMPT: &str = r#"You are a helpful academic assistant. Read the following document text and write a comprehensive summary in Markdown format.

{rules}

Write these sections in order:

# Document Overview

Write 2-3 sentences describing what this document is about, the subject area, and the intended audience.

# Section-by-Section Summary

For each major section or topic in the document, write a short subsection:

## [Section/Topic Name]

Summarise the key content of that section in 3-5 sentences.

# Conclusion

Write 2-3 sentences summarising the overall takeaway from the document.

---
DOCUMENT TEXT:
{source}
---

Write ONLY the Markdown content. No preamble. No commentary."#;

/// Revision notes: definitions, concepts, formulas, facts, a quick table.
pub const KEY_POINTS_PROMPT: &str = r#"You are a helpful academic assistant preparing revision notes for a student. Read the following document text and extract the most important points.

{rules}

Write these sections in order:

# Key Definitions

List every important term or concept defined in the document with a one-line definition.

- **Term**: Definition

# Core Concepts

List the most important ideas, theories, or principles. Explain each in 1-2 sentences.

# Important Formulas / Code Snippets

If the document contains formulas, equations, or code, list them here with brief explanations.

# Must-Remember Facts

List 5-15 bullet points of facts that are most likely to appear in an exam or interview.

# Quick Revision Table

| # | Topic | Key Point |
|---|-------|-----------|
| 1 | ...   | ...       |

---
DOCUMENT TEXT:
{source}
---

Write ONLY the Markdown content. No preamble. No commentary."#;

/// Question answering restricted to the stored document.
pub const ANSWER_PROMPT: &str = r#"You are a helpful academic assistant. A student has uploaded a document and is asking a question about it. Answer the question ONLY using information from the document text below. If the answer is not in the document, say so clearly.

Write your answer in clear, well-formatted Markdown. Use bullet points, code blocks, or tables where appropriate.

DOCUMENT TEXT:
{source}

STUDENT QUESTION:
{question}

Answer the question based ONLY on the document above."#;

/// Per-chunk summary used when the source is too long for one prompt.
pub const CONDENSE_PROMPT: &str = "Summarise the following section of a coding lecture transcript. \
Preserve all technical details, algorithms, code patterns, and examples:\n\n{source}";

pub fn theory_prompt(source: &str) -> String {
    THEORY_PROMPT.replace("{source}", source)
}

pub fn notebook_prompt(source: &str) -> String {
    NOTEBOOK_PROMPT.replace("{source}", source)
}

pub fn summary_prompt(source: &str) -> String {
    fill_document(SUMMARY_PROMPT, source)
}

pub fn key_points_prompt(source: &str) -> String {
    fill_document(KEY_POINTS_PROMPT, source)
}

/// The question is substituted after the source so that a `{question}`
/// literal inside the document text is left alone.
pub fn answer_prompt(source: &str, question: &str) -> String {
    ANSWER_PROMPT
        .replace("{question}", question)
        .replace("{source}", source)
}

pub fn condense_prompt(chunk: &str) -> String {
    CONDENSE_PROMPT.replace("{source}", chunk)
}

// Rules go in first; the source is inserted last so its text is never rescanned.
fn fill_document(template: &str, source: &str) -> String {
    template
        .replace("{rules}", FORMATTING_RULES)
        .replace("{source}", source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theory_prompt_embeds_source() {
        let p = theory_prompt("binary search halves the range");
        assert!(p.contains("TRANSCRIPT:\nbinary search halves the range\n---"));
        assert!(!p.contains("{source}"));
        for heading in [
            "# Concept Overview",
            "# Step-by-Step Explanation",
            "# Common Mistakes",
            "# Complexity Analysis",
            "# Key Takeaways",
        ] {
            assert!(p.contains(heading), "missing {heading}");
        }
    }

    #[test]
    fn test_notebook_prompt_asks_for_python_fences() {
        let p = notebook_prompt("x");
        assert!(p.contains("```python"));
        assert!(p.contains("# Dry Run Trace"));
        assert!(p.contains("<details>"));
    }

    #[test]
    fn test_document_prompts_include_rules() {
        for p in [summary_prompt("doc"), key_points_prompt("doc")] {
            assert!(p.contains("IMPORTANT FORMATTING RULES"));
            assert!(p.contains("DOCUMENT TEXT:\ndoc\n---"));
            assert!(!p.contains("{rules}"));
        }
    }

    #[test]
    fn test_answer_prompt_leaves_placeholders_in_source() {
        let p = answer_prompt("see {question} here", "What is a heap?");
        assert!(p.contains("DOCUMENT TEXT:\nsee {question} here"));
        assert!(p.contains("STUDENT QUESTION:\nWhat is a heap?"));
    }

    #[test]
    fn test_condense_prompt() {
        let p = condense_prompt("chunk body");
        assert!(p.starts_with("Summarise the following section"));
        assert!(p.ends_with("\n\nchunk body"));
    }
}
