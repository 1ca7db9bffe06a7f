//! Streaming lecture generation: emit tokens as the model produces them.
//!
//! The eager [`crate::generate::generate_lecture`] returns only once both
//! pages are finished. [`generate_lecture_stream`] instead yields every
//! theory token, then every notebook token, then a single
//! [`StreamEvent::Completed`] carrying the repaired pages. A failure ends the
//! stream with one `Err` item.
//!
//! The pages are generated one after the other here, not concurrently, so
//! that the tokens of each page arrive contiguously.

use crate::config::StudyConfig;
use crate::error::Lecture2CodeError;
use crate::generate::prepare_source;
use crate::output::LectureOutput;
use crate::output::GenerationMetadata;
use crate::pipeline::chunk::approximate_tokens;
use crate::pipeline::llm::TextGenerator;
use crate::pipeline::repair::repair;
use crate::progress::Stage;
use crate::prompts;
use crate::session::SessionId;
use futures::StreamExt;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tracing::{debug, info, warn};

/// Events buffered between the generating task and a slow consumer.
const CHANNEL_CAPACITY: usize = 64;

/// One item of a lecture stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Raw (unrepaired) theory page output.
    TheoryToken(String),
    /// Raw (unrepaired) notebook page output.
    NotebookToken(String),
    /// Both pages, repaired, with metadata.
    ///
    /// Token usage for the two pages is estimated from prompt and page
    /// length, since streamed responses carry no usage counts.
    Completed(LectureOutput),
    /// The completed material was stored under this session.
    Saved(SessionId),
}

/// A boxed stream of lecture events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, Lecture2CodeError>> + Send>>;

/// Generate a lecture's pages, streaming tokens as they arrive.
///
/// The transcript is validated and, if too long, condensed before this
/// function returns, so those failures surface as an `Err` here rather than
/// inside the stream. Dropping the stream stops generation.
pub async fn generate_lecture_stream(
    generator: Arc<dyn TextGenerator>,
    transcript: &str,
    config: &StudyConfig,
) -> Result<EventStream, Lecture2CodeError> {
    if transcript.trim().is_empty() {
        return Err(Lecture2CodeError::invalid_input("transcript is empty"));
    }
    let start = Instant::now();
    info!("Starting streaming lecture ({} chars)", transcript.len());

    let prepared = prepare_source(generator.as_ref(), transcript, config).await?;
    let config = config.clone();
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let source = prepared.text;
        let mut metadata = prepared.metadata;

        let Some(theory) = stream_stage(
            generator.as_ref(),
            Stage::Theory,
            prompts::theory_prompt(&source),
            &config,
            &tx,
            &mut metadata,
            StreamEvent::TheoryToken,
        )
        .await
        else {
            return;
        };

        let Some(notebook) = stream_stage(
            generator.as_ref(),
            Stage::Notebook,
            prompts::notebook_prompt(&source),
            &config,
            &tx,
            &mut metadata,
            StreamEvent::NotebookToken,
        )
        .await
        else {
            return;
        };

        metadata.processing_time_ms = start.elapsed().as_millis() as u64;
        let output = LectureOutput {
            theory: repair(&theory),
            notebook: repair(&notebook),
            metadata,
        };
        info!("Streaming lecture done in {}ms", output.metadata.processing_time_ms);
        let _ = tx.send(Ok(StreamEvent::Completed(output))).await;
    });

    Ok(Box::pin(ReceiverStream::new(rx)))
}

/// Forward one stage's tokens and add its estimated usage to `metadata`;
/// returns the raw page, or `None` once the stream has ended (error sent, or
/// consumer gone).
async fn stream_stage(
    generator: &dyn TextGenerator,
    stage: Stage,
    prompt: String,
    config: &StudyConfig,
    tx: &mpsc::Sender<Result<StreamEvent, Lecture2CodeError>>,
    metadata: &mut GenerationMetadata,
    event: fn(String) -> StreamEvent,
) -> Option<String> {
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(stage);
    }

    let fail = |e: Lecture2CodeError| {
        warn!("{} stream failed: {}", stage, e);
        if let Some(ref cb) = config.progress_callback {
            cb.on_stage_error(stage, &e.to_string());
        }
        e
    };

    let mut tokens = match generator.generate_stream(&prompt).await {
        Ok(s) => s,
        Err(e) => {
            let _ = tx.send(Err(fail(e))).await;
            return None;
        }
    };

    let mut page = String::new();
    while let Some(item) = tokens.next().await {
        match item {
            Ok(token) => {
                page.push_str(&token);
                if tx.send(Ok(event(token))).await.is_err() {
                    debug!("Stream consumer dropped during {} stage", stage);
                    return None;
                }
            }
            Err(e) => {
                let _ = tx.send(Err(fail(e))).await;
                return None;
            }
        }
    }

    metadata.add_usage(approximate_tokens(&prompt), approximate_tokens(&page));
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_complete(stage, page.len());
    }
    Some(page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::{Generation, TokenStream};
    use async_trait::async_trait;
    use futures::stream;

    struct Tokens;

    #[async_trait]
    impl TextGenerator for Tokens {
        fn model_name(&self) -> &str {
            "tokens"
        }

        async fn generate(&self, _prompt: &str) -> Result<Generation, Lecture2CodeError> {
            unreachable!("streaming only")
        }

        async fn generate_stream(&self, prompt: &str) -> Result<TokenStream, Lecture2CodeError> {
            let parts: Vec<&'static str> = if prompt.contains("theory page") {
                vec!["# Over", "view\nText"]
            } else {
                vec!["```python\n", "x = 1\n```"]
            };
            Ok(Box::pin(stream::iter(parts.into_iter().map(|p| Ok(p.to_string())))))
        }
    }

    #[tokio::test]
    async fn test_theory_tokens_then_notebook_then_completed() {
        let events: Vec<StreamEvent> =
            generate_lecture_stream(Arc::new(Tokens), "lecture", &StudyConfig::default())
                .await
                .unwrap()
                .map(|e| e.unwrap())
                .collect()
                .await;

        assert_eq!(events[0], StreamEvent::TheoryToken("# Over".into()));
        assert_eq!(events[1], StreamEvent::TheoryToken("view\nText".into()));
        assert_eq!(events[2], StreamEvent::NotebookToken("```python\n".into()));
        assert_eq!(events[3], StreamEvent::NotebookToken("x = 1\n```".into()));
        match &events[4] {
            StreamEvent::Completed(out) => {
                assert_eq!(out.theory, "# Overview\n\nText\n");
                assert_eq!(out.notebook, "```python\nx = 1\n```\n");
            }
            other => panic!("expected Completed, got {other:?}"),
        }
        assert_eq!(events.len(), 5);
    }

    #[tokio::test]
    async fn test_completed_metadata_estimates_page_usage() {
        let events: Vec<StreamEvent> =
            generate_lecture_stream(Arc::new(Tokens), "lecture", &StudyConfig::default())
                .await
                .unwrap()
                .map(|e| e.unwrap())
                .collect()
                .await;

        let Some(StreamEvent::Completed(out)) = events.last() else {
            panic!("stream did not end with Completed");
        };
        let prompts_len = approximate_tokens(&prompts::theory_prompt("lecture"))
            + approximate_tokens(&prompts::notebook_prompt("lecture"));
        let pages_len =
            approximate_tokens("# Overview\nText") + approximate_tokens("```python\nx = 1\n```");
        assert_eq!(out.metadata.input_tokens, prompts_len);
        assert_eq!(out.metadata.output_tokens, pages_len);
        assert!(out.metadata.output_tokens > 0);
    }

    #[tokio::test]
    async fn test_empty_transcript_fails_before_streaming() {
        let result = generate_lecture_stream(Arc::new(Tokens), " ", &StudyConfig::default()).await;
        assert!(matches!(result, Err(Lecture2CodeError::InvalidInput { .. })));
    }
}
