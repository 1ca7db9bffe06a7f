//! # lecture2code
//!
//! Turn lecture transcripts into study material: a theory page, a runnable
//! Jupyter notebook, and (for documents) a summary with revision notes.
//!
//! ## Why this crate?
//!
//! Language models, small local ones especially, write Markdown that reads
//! fine but renders badly: headings glued to paragraphs, list items jammed
//! onto one line, tables and code fences with no blank line before them.
//! This crate wraps generation with a deterministic repair pass and splits the
//! repaired notebook page into code and narrative cells for `.ipynb` export.
//!
//! ## Pipeline Overview
//!
//! ```text
//! transcript
//!  │
//!  ├─ 1. Prepare  condense chunk-by-chunk if over the token limit
//!  ├─ 2. Generate theory + notebook pages concurrently
//!  ├─ 3. Repair   7-pass Markdown cleanup
//!  ├─ 4. Segment  ```python blocks → code cells, prose → narrative cells
//!  └─ 5. Export   nbformat 4.5 JSON
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lecture2code::{StudyConfig, StudyService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / EDGEQUAKE_LLM_PROVIDER / ...
//!     let service = StudyService::from_config(StudyConfig::default())?;
//!     let (id, lecture) = service.process_lecture("Today: binary search ...").await?;
//!     println!("{}", lecture.theory);
//!     std::fs::write("lecture.ipynb", service.export(&id)?)?;
//!     Ok(())
//! }
//! ```
//!
//! The repair and segmentation passes need no model at all:
//!
//! ```rust
//! use lecture2code::{repair, segment, CellKind};
//!
//! let fixed = repair("Intro\n# Heading\ntext");
//! assert_eq!(fixed, "Intro\n\n# Heading\n\ntext\n");
//!
//! let cells = segment("Run it:\n```python\nprint(1)\n```");
//! assert_eq!(cells[1].kind(), CellKind::Code);
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `l2c` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod generate;
pub mod notebook;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod service;
pub mod session;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{StudyConfig, StudyConfigBuilder, DEFAULT_MODEL};
pub use error::Lecture2CodeError;
pub use generate::{answer_question, generate_document, generate_lecture, prepare_source};
pub use notebook::{export_notebook, NotebookDocument};
pub use output::{Answer, DocumentOutput, GenerationMetadata, LectureOutput, StudyMaterial};
pub use pipeline::llm::{Generation, LlmGenerator, TextGenerator, TokenStream};
pub use pipeline::repair::repair;
pub use pipeline::segment::{segment, Cell, CellKind};
pub use progress::{GenerationProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
pub use service::StudyService;
pub use session::{SessionEntry, SessionId, SessionStore};
pub use stream::{generate_lecture_stream, EventStream, StreamEvent};
