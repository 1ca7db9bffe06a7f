//! Generation chains: lecture pages, document notes, and document Q&A.
//!
//! Every chain follows the same shape: prepare the source (condensing it
//! chunk-by-chunk when it is too long), fill the stage prompts, ask the model,
//! and run the raw output through [`repair`]. Independent stages run
//! concurrently on the same prepared source.

use crate::config::StudyConfig;
use crate::error::Lecture2CodeError;
use crate::output::{Answer, DocumentOutput, GenerationMetadata, LectureOutput};
use crate::pipeline::chunk::{approximate_tokens, split_chunks};
use crate::pipeline::llm::TextGenerator;
use crate::pipeline::repair::repair;
use crate::progress::Stage;
use crate::prompts;
use std::time::Instant;
use tracing::{debug, info};

/// Source text ready to be embedded in a prompt.
#[derive(Debug, Clone)]
pub struct PreparedSource {
    pub text: String,
    /// Token count, chunking flag and condensing usage so far.
    pub metadata: GenerationMetadata,
}

/// Condense `source` if it is over the configured token limit.
///
/// Chunks are summarised one after another, in order, and the summaries are
/// joined with a blank line. Short sources pass through untouched.
pub async fn prepare_source(
    generator: &dyn TextGenerator,
    source: &str,
    config: &StudyConfig,
) -> Result<PreparedSource, Lecture2CodeError> {
    let source_token_count = approximate_tokens(source);
    let mut metadata = GenerationMetadata {
        source_token_count,
        model: generator.model_name().to_string(),
        ..Default::default()
    };

    if source_token_count <= config.max_source_tokens {
        return Ok(PreparedSource {
            text: source.to_string(),
            metadata,
        });
    }

    let chunks = split_chunks(source, config.chunk_size_chars, config.chunk_overlap_chars);
    info!(
        "Source is ~{} tokens (limit {}), condensing {} chunks",
        source_token_count,
        config.max_source_tokens,
        chunks.len()
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(Stage::Condense);
    }

    let mut summaries = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        let generation = generator
            .generate(&prompts::condense_prompt(chunk))
            .await
            .inspect_err(|e| {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_stage_error(Stage::Condense, &e.to_string());
                }
            })?;
        metadata.add_usage(generation.input_tokens, generation.output_tokens);
        summaries.push(generation.text);

        if let Some(ref cb) = config.progress_callback {
            cb.on_chunk_condensed(i + 1, chunks.len());
        }
    }

    let text = summaries.join("\n\n");
    metadata.chunked = true;
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_complete(Stage::Condense, text.len());
    }
    debug!("Condensed source to {} chars", text.len());

    Ok(PreparedSource { text, metadata })
}

/// Output of one repaired stage.
struct StageOutput {
    markdown: String,
    input_tokens: usize,
    output_tokens: usize,
}

async fn run_stage(
    generator: &dyn TextGenerator,
    stage: Stage,
    prompt: String,
    config: &StudyConfig,
) -> Result<StageOutput, Lecture2CodeError> {
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(stage);
    }

    let generation = match generator.generate(&prompt).await {
        Ok(g) => g,
        Err(e) => {
            if let Some(ref cb) = config.progress_callback {
                cb.on_stage_error(stage, &e.to_string());
            }
            return Err(e);
        }
    };

    let markdown = repair(&generation.text);
    debug!("{} stage: {} chars after repair", stage, markdown.len());
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_complete(stage, markdown.len());
    }

    Ok(StageOutput {
        markdown,
        input_tokens: generation.input_tokens,
        output_tokens: generation.output_tokens,
    })
}

fn require_text(text: &str, what: &str) -> Result<(), Lecture2CodeError> {
    if text.trim().is_empty() {
        return Err(Lecture2CodeError::invalid_input(format!("{what} is empty")));
    }
    Ok(())
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Generate the theory page and the notebook page for a lecture transcript.
///
/// Both stages run concurrently; if either fails the whole call fails.
///
/// # Errors
/// [`Lecture2CodeError::InvalidInput`] for an empty transcript, otherwise
/// whatever the generator returns.
pub async fn generate_lecture(
    generator: &dyn TextGenerator,
    transcript: &str,
    config: &StudyConfig,
) -> Result<LectureOutput, Lecture2CodeError> {
    require_text(transcript, "transcript")?;
    let start = Instant::now();
    info!("Generating lecture material ({} chars)", transcript.len());

    let prepared = prepare_source(generator, transcript, config).await?;
    let (theory, notebook) = tokio::try_join!(
        run_stage(generator, Stage::Theory, prompts::theory_prompt(&prepared.text), config),
        run_stage(generator, Stage::Notebook, prompts::notebook_prompt(&prepared.text), config),
    )?;

    let mut metadata = prepared.metadata;
    metadata.add_usage(theory.input_tokens, theory.output_tokens);
    metadata.add_usage(notebook.input_tokens, notebook.output_tokens);
    metadata.processing_time_ms = elapsed_ms(start);
    info!(
        "Lecture done in {}ms ({} in / {} out tokens)",
        metadata.processing_time_ms, metadata.input_tokens, metadata.output_tokens
    );

    Ok(LectureOutput {
        theory: theory.markdown,
        notebook: notebook.markdown,
        metadata,
    })
}

/// Generate a summary and revision notes for a document's extracted text.
pub async fn generate_document(
    generator: &dyn TextGenerator,
    text: &str,
    config: &StudyConfig,
) -> Result<DocumentOutput, Lecture2CodeError> {
    require_text(text, "document text")?;
    let start = Instant::now();
    info!("Generating document notes ({} chars)", text.len());

    let prepared = prepare_source(generator, text, config).await?;
    let (summary, points) = tokio::try_join!(
        run_stage(generator, Stage::Summary, prompts::summary_prompt(&prepared.text), config),
        run_stage(generator, Stage::KeyPoints, prompts::key_points_prompt(&prepared.text), config),
    )?;

    let mut metadata = prepared.metadata;
    metadata.add_usage(summary.input_tokens, summary.output_tokens);
    metadata.add_usage(points.input_tokens, points.output_tokens);
    metadata.processing_time_ms = elapsed_ms(start);
    info!("Document done in {}ms", metadata.processing_time_ms);

    Ok(DocumentOutput {
        summary: summary.markdown,
        points: points.markdown,
        source_text: prepared.text,
        metadata,
    })
}

/// Answer a question using only `source_text`.
///
/// `source_text` is expected to be already prepared (see
/// [`DocumentOutput::source_text`]); it is not condensed again.
pub async fn answer_question(
    generator: &dyn TextGenerator,
    source_text: &str,
    question: &str,
    config: &StudyConfig,
) -> Result<Answer, Lecture2CodeError> {
    require_text(question, "question")?;
    let start = Instant::now();

    let out = run_stage(
        generator,
        Stage::Answer,
        prompts::answer_prompt(source_text, question.trim()),
        config,
    )
    .await?;

    let metadata = GenerationMetadata {
        source_token_count: approximate_tokens(source_text),
        chunked: false,
        model: generator.model_name().to_string(),
        input_tokens: out.input_tokens,
        output_tokens: out.output_tokens,
        processing_time_ms: elapsed_ms(start),
    };

    Ok(Answer {
        question: question.trim().to_string(),
        answer: out.markdown,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::Generation;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Answers by prompt kind and records every prompt it sees.
    #[derive(Default)]
    struct Scripted {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, prompt: &str) -> Result<Generation, Lecture2CodeError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let text = if prompt.starts_with("Summarise the following section") {
                "condensed".to_string()
            } else if prompt.contains("theory page") {
                "# Concept Overview\nText".to_string()
            } else {
                "# Code Implementation\n```python\nx = 1\n```".to_string()
            };
            Ok(Generation {
                text,
                input_tokens: 10,
                output_tokens: 2,
            })
        }
    }

    fn config() -> StudyConfig {
        StudyConfig::builder()
            .max_source_tokens(50)
            .chunk_size_chars(100)
            .chunk_overlap_chars(10)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_short_source_is_not_condensed() {
        let gen = Scripted::default();
        let prepared = prepare_source(&gen, "short transcript", &config()).await.unwrap();
        assert_eq!(prepared.text, "short transcript");
        assert!(!prepared.metadata.chunked);
        assert!(gen.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_long_source_is_condensed_per_chunk() {
        let gen = Scripted::default();
        let source = "word ".repeat(100);
        let prepared = prepare_source(&gen, &source, &config()).await.unwrap();

        let calls = gen.prompts.lock().unwrap().len();
        assert!(calls > 1);
        assert!(prepared.metadata.chunked);
        assert_eq!(prepared.metadata.source_token_count, 125);
        assert_eq!(prepared.text, vec!["condensed"; calls].join("\n\n"));
        assert_eq!(prepared.metadata.input_tokens, 10 * calls);
    }

    #[tokio::test]
    async fn test_lecture_pages_are_repaired() {
        let gen = Scripted::default();
        let out = generate_lecture(&gen, "a lecture", &config()).await.unwrap();
        assert_eq!(out.theory, "# Concept Overview\n\nText\n");
        assert_eq!(out.notebook, "# Code Implementation\n\n```python\nx = 1\n```\n");
        assert_eq!(out.metadata.input_tokens, 20);
        assert_eq!(out.metadata.model, "scripted");
    }

    #[tokio::test]
    async fn test_empty_transcript_is_rejected() {
        let gen = Scripted::default();
        let err = generate_lecture(&gen, "  \n", &config()).await.unwrap_err();
        assert!(matches!(err, Lecture2CodeError::InvalidInput { .. }));
        assert!(gen.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_answer_uses_source_verbatim() {
        let gen = Scripted::default();
        let answer = answer_question(&gen, "heaps are trees", " What is a heap? ", &config())
            .await
            .unwrap();
        assert_eq!(answer.question, "What is a heap?");
        let prompts = gen.prompts.lock().unwrap();
        assert!(prompts[0].contains("DOCUMENT TEXT:\nheaps are trees"));
    }
}
