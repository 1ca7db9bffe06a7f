//! [`StudyService`]: the generation chains plus session bookkeeping.
//!
//! This is the surface a front end (HTTP handlers, the CLI) talks to. Every
//! successful generation is stored in the injected [`SessionStore`] and the
//! returned [`SessionId`] is what later `ask` and `export` calls refer to.

use crate::config::StudyConfig;
use crate::error::Lecture2CodeError;
use crate::generate::{answer_question, generate_document, generate_lecture};
use crate::notebook::NotebookDocument;
use crate::output::{Answer, DocumentOutput, LectureOutput, StudyMaterial};
use crate::pipeline::llm::{LlmGenerator, TextGenerator};
use crate::session::{SessionId, SessionStore};
use crate::stream::{generate_lecture_stream, EventStream, StreamEvent};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::info;

/// Generation service with session storage.
pub struct StudyService {
    generator: Arc<dyn TextGenerator>,
    sessions: Arc<SessionStore>,
    config: StudyConfig,
}

impl StudyService {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        sessions: Arc<SessionStore>,
        config: StudyConfig,
    ) -> Self {
        Self {
            generator,
            sessions,
            config,
        }
    }

    /// Build an [`LlmGenerator`] and a fresh store from `config`.
    pub fn from_config(config: StudyConfig) -> Result<Self, Lecture2CodeError> {
        let generator = LlmGenerator::from_config(&config)?;
        let sessions = Arc::new(SessionStore::new(config.session_ttl()));
        Ok(Self::new(Arc::new(generator), sessions, config))
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn config(&self) -> &StudyConfig {
        &self.config
    }

    /// Generate theory and notebook pages and store them.
    pub async fn process_lecture(
        &self,
        transcript: &str,
    ) -> Result<(SessionId, LectureOutput), Lecture2CodeError> {
        let output = generate_lecture(self.generator.as_ref(), transcript, &self.config).await?;
        let id = self
            .sessions
            .save(StudyMaterial::from(&output), output.metadata.clone());
        info!("Lecture session {}", id);
        Ok((id, output))
    }

    /// Streaming variant of [`process_lecture`](Self::process_lecture).
    ///
    /// The `Completed` event is followed by a `Saved` event once the pages
    /// are stored.
    pub async fn process_lecture_stream(
        &self,
        transcript: &str,
    ) -> Result<EventStream, Lecture2CodeError> {
        let events =
            generate_lecture_stream(Arc::clone(&self.generator), transcript, &self.config).await?;
        let sessions = Arc::clone(&self.sessions);

        let events = events.flat_map(move |item| {
            let saved = match item {
                Ok(StreamEvent::Completed(ref output)) => {
                    let id = sessions.save(StudyMaterial::from(output), output.metadata.clone());
                    info!("Lecture session {}", id);
                    Some(Ok(StreamEvent::Saved(id)))
                }
                _ => None,
            };
            stream::iter(std::iter::once(item).chain(saved))
        });
        Ok(Box::pin(events))
    }

    /// Generate a summary and revision notes and store them.
    pub async fn process_document(
        &self,
        text: &str,
    ) -> Result<(SessionId, DocumentOutput), Lecture2CodeError> {
        let output = generate_document(self.generator.as_ref(), text, &self.config).await?;
        let id = self
            .sessions
            .save(StudyMaterial::from(&output), output.metadata.clone());
        info!("Document session {}", id);
        Ok((id, output))
    }

    /// Answer a question about a stored document.
    ///
    /// # Errors
    /// [`Lecture2CodeError::SessionNotFound`] for an unknown or expired id,
    /// [`Lecture2CodeError::InvalidInput`] if the session holds lecture pages.
    pub async fn ask(&self, id: &SessionId, question: &str) -> Result<Answer, Lecture2CodeError> {
        let entry = self.sessions.get(id)?;
        let StudyMaterial::Document { source_text, .. } = entry.material else {
            return Err(Lecture2CodeError::invalid_input(format!(
                "session '{id}' holds lecture pages, not a document"
            )));
        };
        answer_question(self.generator.as_ref(), &source_text, question, &self.config).await
    }

    /// Export a stored lecture as `.ipynb` bytes.
    ///
    /// # Errors
    /// [`Lecture2CodeError::SessionNotFound`] for an unknown or expired id,
    /// [`Lecture2CodeError::NotExportable`] for a document session.
    pub fn export(&self, id: &SessionId) -> Result<Vec<u8>, Lecture2CodeError> {
        let entry = self.sessions.get(id)?;
        match entry.material {
            StudyMaterial::Lecture { theory, notebook } => {
                NotebookDocument::assemble(&theory, &notebook).to_ipynb()
            }
            StudyMaterial::Document { .. } => Err(Lecture2CodeError::NotExportable {
                id: id.to_string(),
            }),
        }
    }
}
