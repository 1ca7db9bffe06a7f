//! Configuration for study-material generation.
//!
//! Every generation knob lives in [`StudyConfig`], built via
//! [`StudyConfigBuilder`]. The repair, segmentation and export passes take no
//! configuration at all; only the model-facing orchestration does.

use crate::error::Lecture2CodeError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Configuration for generating theory/notebook pages and document notes.
///
/// # Example
/// ```rust
/// use lecture2code::StudyConfig;
///
/// let config = StudyConfig::builder()
///     .model("gpt-4.1")
///     .fallback_model("gpt-4.1-mini")
///     .max_source_tokens(8000)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_source_tokens, 8000);
/// ```
#[derive(Clone)]
pub struct StudyConfig {
    /// LLM model identifier, e.g. "gpt-4.1", "llama3.1:8b".
    /// If None, uses [`DEFAULT_MODEL`] or the auto-detected provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Lighter model tried once after the primary model has exhausted its
    /// retries. Requires a resolvable provider name. Default: None.
    pub fallback_model: Option<String>,

    /// Sampling temperature. Default: 0.2.
    ///
    /// Study material benefits from a little variety in worked examples, but
    /// the heading structure the prompts ask for must survive.
    pub temperature: f32,

    /// Maximum tokens the model may generate per page. Default: 4096.
    pub max_tokens: usize,

    /// Retries on a failed model call before falling back. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call model timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Source texts above this approximate token count are chunked and
    /// summarised before generation. Default: 6000.
    pub max_source_tokens: usize,

    /// Chunk size in characters for summarisation. Default: 8000 (~2000 tokens).
    pub chunk_size_chars: usize,

    /// Overlap between consecutive chunks in characters. Default: 800.
    pub chunk_overlap_chars: usize,

    /// Lifetime of a stored session. Default: 3600 s.
    pub session_ttl_secs: u64,

    /// Optional stage-level progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            fallback_model: None,
            temperature: 0.2,
            max_tokens: 4096,
            max_retries: 2,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            max_source_tokens: 6000,
            chunk_size_chars: 8000,
            chunk_overlap_chars: 800,
            session_ttl_secs: 3600,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for StudyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StudyConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("fallback_model", &self.fallback_model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_source_tokens", &self.max_source_tokens)
            .field("chunk_size_chars", &self.chunk_size_chars)
            .field("chunk_overlap_chars", &self.chunk_overlap_chars)
            .field("session_ttl_secs", &self.session_ttl_secs)
            .finish()
    }
}

impl StudyConfig {
    /// Create a new builder for `StudyConfig`.
    pub fn builder() -> StudyConfigBuilder {
        StudyConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    /// Model name recorded in generation metadata.
    pub fn model_label(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Builder for [`StudyConfig`].
#[derive(Debug)]
pub struct StudyConfigBuilder {
    config: StudyConfig,
}

impl StudyConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn fallback_model(mut self, model: impl Into<String>) -> Self {
        self.config.fallback_model = Some(model.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn max_source_tokens(mut self, n: usize) -> Self {
        self.config.max_source_tokens = n;
        self
    }

    pub fn chunk_size_chars(mut self, n: usize) -> Self {
        self.config.chunk_size_chars = n;
        self
    }

    pub fn chunk_overlap_chars(mut self, n: usize) -> Self {
        self.config.chunk_overlap_chars = n;
        self
    }

    pub fn session_ttl_secs(mut self, secs: u64) -> Self {
        self.config.session_ttl_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<StudyConfig, Lecture2CodeError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(Lecture2CodeError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.max_source_tokens == 0 {
            return Err(Lecture2CodeError::InvalidConfig(
                "max_source_tokens must be ≥ 1".into(),
            ));
        }
        if c.chunk_size_chars == 0 {
            return Err(Lecture2CodeError::InvalidConfig(
                "chunk_size_chars must be ≥ 1".into(),
            ));
        }
        if c.chunk_overlap_chars >= c.chunk_size_chars {
            return Err(Lecture2CodeError::InvalidConfig(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                c.chunk_overlap_chars, c.chunk_size_chars
            )));
        }
        if c.session_ttl_secs == 0 {
            return Err(Lecture2CodeError::InvalidConfig(
                "session TTL must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}
