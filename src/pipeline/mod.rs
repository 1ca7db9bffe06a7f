//! Pipeline stages for turning source text into study material.
//!
//! Each submodule implements exactly one transformation step.
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ chunk ──▶ llm ──▶ repair ──▶ segment
//! (text)    (condense) (model) (Markdown)  (cells)
//! ```
//!
//! 1. [`chunk`]: estimate size and split over-long sources into
//!    overlapping chunks for condensing
//! 2. [`llm`]: the [`llm::TextGenerator`] boundary and the
//!    `edgequake-llm` implementation with retry, timeout and fallback
//! 3. [`repair`]: deterministic passes that fix the spacing small models
//!    get wrong (headings, jammed lists, tables, fences, `<details>`)
//! 4. [`segment`]: split a repaired notebook page into code and narrative
//!    cells at ```` ```python ```` fences
//!
//! `repair` and `segment` are pure functions with no I/O.

pub mod chunk;
pub mod llm;
pub mod repair;
pub mod segment;
