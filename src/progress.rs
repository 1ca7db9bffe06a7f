//! Progress-callback trait for generation stages.
//!
//! Inject an [`Arc<dyn GenerationProgressCallback>`] via
//! [`crate::config::StudyConfigBuilder::progress_callback`] to be told when
//! each model call starts and finishes. The CLI drives a spinner from it; a
//! server could forward the same events to a websocket.
//!
//! # Example
//!
//! ```rust
//! use lecture2code::{GenerationProgressCallback, Stage, StudyConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Counter(AtomicUsize);
//!
//! impl GenerationProgressCallback for Counter {
//!     fn on_stage_complete(&self, stage: Stage, chars: usize) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{stage} done ({chars} chars)");
//!     }
//! }
//!
//! let config = StudyConfig::builder()
//!     .progress_callback(Arc::new(Counter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// One model-backed step of a generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Summarising chunks of an over-long source.
    Condense,
    Theory,
    Notebook,
    Summary,
    KeyPoints,
    Answer,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Condense => "condense",
            Stage::Theory => "theory",
            Stage::Notebook => "notebook",
            Stage::Summary => "summary",
            Stage::KeyPoints => "key points",
            Stage::Answer => "answer",
        };
        f.write_str(name)
    }
}

/// Called by the orchestration as it runs each stage.
///
/// The theory and notebook stages (and summary/key points) run concurrently,
/// so implementations must be `Send + Sync` and synchronise their own state.
/// All methods default to no-ops.
pub trait GenerationProgressCallback: Send + Sync {
    /// Called before the model is asked for a stage.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called after a stage's output has been repaired.
    ///
    /// * `chars`: byte length of the repaired Markdown
    fn on_stage_complete(&self, stage: Stage, chars: usize) {
        let _ = (stage, chars);
    }

    /// Called after each chunk of an over-long source has been summarised.
    ///
    /// * `index`: 1-based chunk number
    fn on_chunk_condensed(&self, index: usize, total: usize) {
        let _ = (index, total);
    }

    /// Called when a stage fails for good.
    fn on_stage_error(&self, stage: Stage, error: &str) {
        let _ = (stage, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl GenerationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::StudyConfig`].
pub type ProgressCallback = Arc<dyn GenerationProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl GenerationProgressCallback for Recorder {
        fn on_stage_start(&self, stage: Stage) {
            self.events.lock().unwrap().push(format!("start {stage}"));
        }

        fn on_chunk_condensed(&self, index: usize, total: usize) {
            self.events.lock().unwrap().push(format!("chunk {index}/{total}"));
        }
    }

    #[test]
    fn noop_callback_accepts_all_events() {
        let cb = NoopProgressCallback;
        cb.on_stage_start(Stage::Theory);
        cb.on_stage_complete(Stage::Theory, 10);
        cb.on_chunk_condensed(1, 2);
        cb.on_stage_error(Stage::Notebook, "boom");
    }

    #[test]
    fn overridden_methods_receive_events() {
        let rec = Recorder::default();
        let cb: &dyn GenerationProgressCallback = &rec;
        cb.on_stage_start(Stage::KeyPoints);
        cb.on_chunk_condensed(2, 3);
        cb.on_stage_complete(Stage::KeyPoints, 5);
        assert_eq!(
            *rec.events.lock().unwrap(),
            vec!["start key points".to_string(), "chunk 2/3".to_string()]
        );
    }

    #[test]
    fn stage_serialises_snake_case() {
        assert_eq!(serde_json::to_string(&Stage::KeyPoints).unwrap(), "\"key_points\"");
    }
}
