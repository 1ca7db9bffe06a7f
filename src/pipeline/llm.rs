//! Model interaction: the [`TextGenerator`] boundary and its
//! `edgequake-llm` implementation.
//!
//! Orchestration code only ever sees [`TextGenerator`]: one prompt in, one
//! block of raw Markdown out (or a stream of tokens).
//!
//! ## Retry Strategy
//!
//! [`LlmGenerator`] retries a failed call with exponential backoff
//! (`retry_backoff_ms * 2^(retry - 1)`), then tries the fallback provider once
//! if one is configured. A call that outlives `api_timeout_secs` counts as a
//! failed attempt.
//!
//! Streaming goes straight to the primary provider's `stream`. Opening the
//! stream is bounded by `api_timeout_secs` and is not retried. Providers that
//! cannot stream are called through [`TextGenerator::generate`] instead.

use crate::config::{StudyConfig, DEFAULT_MODEL};
use crate::error::Lecture2CodeError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use futures::stream::{self, Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// A boxed stream of raw output tokens.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, Lecture2CodeError>> + Send>>;

/// Raw output of one model call, before repair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// Anything that can turn a prompt into Markdown.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Model identifier recorded in generation metadata.
    fn model_name(&self) -> &str;

    /// Run one prompt to completion.
    async fn generate(&self, prompt: &str) -> Result<Generation, Lecture2CodeError>;

    /// Run one prompt, yielding output as it is produced.
    ///
    /// The default implementation waits for [`generate`](Self::generate) and
    /// yields its whole output as a single token.
    async fn generate_stream(&self, prompt: &str) -> Result<TokenStream, Lecture2CodeError> {
        let generation = self.generate(prompt).await?;
        Ok(Box::pin(stream::once(async move { Ok(generation.text) })))
    }
}

/// [`TextGenerator`] backed by an `edgequake-llm` provider.
pub struct LlmGenerator {
    primary: Arc<dyn LLMProvider>,
    fallback: Option<Arc<dyn LLMProvider>>,
    model: String,
    options: CompletionOptions,
    max_retries: u32,
    retry_backoff_ms: u64,
    call_timeout: Duration,
}

impl LlmGenerator {
    /// Wrap a provider using the sampling and retry settings from `config`.
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>, config: &StudyConfig) -> Self {
        Self {
            primary: provider,
            fallback: None,
            model: model.into(),
            options: build_options(config),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            call_timeout: config.api_timeout(),
        }
    }

    pub fn with_fallback(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.fallback = Some(provider);
        self
    }

    /// Resolve primary (and fallback) providers from config and environment.
    pub fn from_config(config: &StudyConfig) -> Result<Self, Lecture2CodeError> {
        let resolved = resolve_provider(config)?;
        let mut generator = Self::new(resolved.provider, resolved.model, config);

        if let Some(ref fallback_model) = config.fallback_model {
            match resolved.provider_name {
                Some(ref name) => {
                    generator = generator.with_fallback(create_provider(name, fallback_model)?);
                    info!("Fallback model: {}/{}", name, fallback_model);
                }
                None => warn!(
                    "Fallback model '{}' ignored: provider was auto-detected",
                    fallback_model
                ),
            }
        }

        Ok(generator)
    }

    /// Call one provider, retrying up to `retries` times with exponential backoff.
    async fn call_with_retries(
        &self,
        provider: &Arc<dyn LLMProvider>,
        messages: &[ChatMessage],
        retries: u32,
        label: &str,
    ) -> Result<Generation, CallFailure> {
        let mut last_err = CallFailure::Api("no attempt made".to_string());

        for attempt in 0..=retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "{}: retry {}/{} after {}ms",
                    label, attempt, retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            let start = Instant::now();
            match timeout(self.call_timeout, provider.chat(messages, Some(&self.options))).await {
                Ok(Ok(response)) => {
                    debug!(
                        "{}: {} input tokens, {} output tokens, {:?}",
                        label,
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    return Ok(Generation {
                        text: response.content,
                        input_tokens: response.prompt_tokens,
                        output_tokens: response.completion_tokens,
                    });
                }
                Ok(Err(e)) => {
                    warn!("{}: attempt {} failed: {}", label, attempt + 1, e);
                    last_err = CallFailure::Api(e.to_string());
                }
                Err(_) => {
                    warn!(
                        "{}: attempt {} timed out after {}s",
                        label,
                        attempt + 1,
                        self.call_timeout.as_secs()
                    );
                    last_err = CallFailure::Timeout;
                }
            }
        }

        Err(last_err)
    }
}

#[async_trait]
impl TextGenerator for LlmGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<Generation, Lecture2CodeError> {
        let messages = vec![ChatMessage::user(prompt)];
        let mut attempts = self.max_retries + 1;

        let primary_err = match self
            .call_with_retries(&self.primary, &messages, self.max_retries, "primary")
            .await
        {
            Ok(generation) => return Ok(generation),
            Err(e) => e,
        };

        let Some(ref fallback) = self.fallback else {
            return Err(self.failure_error(primary_err, attempts));
        };

        warn!("Primary model failed, trying fallback");
        attempts += 1;
        self.call_with_retries(fallback, &messages, 0, "fallback")
            .await
            .map_err(|failure| self.failure_error(failure, attempts))
    }

    async fn generate_stream(&self, prompt: &str) -> Result<TokenStream, Lecture2CodeError> {
        if !self.primary.supports_streaming() {
            debug!("{} cannot stream, generating eagerly", self.primary.name());
            let generation = self.generate(prompt).await?;
            return Ok(Box::pin(stream::once(async move { Ok(generation.text) })));
        }

        let tokens = timeout(self.call_timeout, self.primary.stream(prompt))
            .await
            .map_err(|_| Lecture2CodeError::Timeout {
                secs: self.call_timeout.as_secs(),
            })?
            .map_err(stream_error)?;

        Ok(Box::pin(tokens.map(|token| token.map_err(stream_error))))
    }
}

fn stream_error(e: edgequake_llm::LlmError) -> Lecture2CodeError {
    Lecture2CodeError::LlmApiError {
        attempts: 1,
        message: e.to_string(),
    }
}

/// How the last attempt against a provider failed.
enum CallFailure {
    Api(String),
    Timeout,
}

impl LlmGenerator {
    fn failure_error(&self, failure: CallFailure, attempts: u32) -> Lecture2CodeError {
        match failure {
            CallFailure::Api(message) => Lecture2CodeError::LlmApiError { attempts, message },
            CallFailure::Timeout => Lecture2CodeError::Timeout {
                secs: self.call_timeout.as_secs(),
            },
        }
    }
}

/// Build `CompletionOptions` from the study config.
fn build_options(config: &StudyConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

struct ResolvedProvider {
    provider: Arc<dyn LLMProvider>,
    provider_name: Option<String>,
    model: String,
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, Lecture2CodeError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Lecture2CodeError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. a pre-built provider in the config
/// 2. a provider name (+ optional model) in the config
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`
/// 4. `OPENAI_API_KEY`
/// 5. `ProviderFactory::from_env` auto-detection
fn resolve_provider(config: &StudyConfig) -> Result<ResolvedProvider, Lecture2CodeError> {
    let model = config.model_label().to_string();

    if let Some(ref provider) = config.provider {
        return Ok(ResolvedProvider {
            provider: Arc::clone(provider),
            provider_name: config.provider_name.clone(),
            model,
        });
    }

    if let Some(ref name) = config.provider_name {
        return Ok(ResolvedProvider {
            provider: create_provider(name, &model)?,
            provider_name: Some(name.clone()),
            model,
        });
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return Ok(ResolvedProvider {
                provider: create_provider(&prov, &env_model)?,
                provider_name: Some(prov),
                model: env_model,
            });
        }
    }

    if std::env::var("OPENAI_API_KEY").is_ok_and(|key| !key.is_empty()) {
        return Ok(ResolvedProvider {
            provider: create_provider("openai", &model)?,
            provider_name: Some("openai".to_string()),
            model,
        });
    }

    let (provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Lecture2CodeError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or EDGEQUAKE_LLM_PROVIDER=ollama.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(ResolvedProvider {
        provider,
        provider_name: None,
        model: config.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgequake_llm::{LLMResponse, LlmError};
    use futures::stream::BoxStream;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Echo;

    #[async_trait]
    impl TextGenerator for Echo {
        fn model_name(&self) -> &str {
            "echo"
        }

        async fn generate(&self, prompt: &str) -> Result<Generation, Lecture2CodeError> {
            Ok(Generation {
                text: prompt.to_uppercase(),
                ..Default::default()
            })
        }
    }

    /// Provider that fails its first `failures` chat calls, optionally
    /// sleeping before each answer.
    struct Flaky {
        failures: u32,
        delay: Option<Duration>,
        streams: bool,
        calls: AtomicU32,
    }

    impl Flaky {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                delay: None,
                streams: false,
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LLMProvider for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        fn model(&self) -> &str {
            "flaky-model"
        }

        fn max_context_length(&self) -> usize {
            8192
        }

        async fn complete(&self, prompt: &str) -> edgequake_llm::Result<LLMResponse> {
            self.chat(&[ChatMessage::user(prompt)], None).await
        }

        async fn complete_with_options(
            &self,
            prompt: &str,
            options: &CompletionOptions,
        ) -> edgequake_llm::Result<LLMResponse> {
            self.chat(&[ChatMessage::user(prompt)], Some(options)).await
        }

        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _options: Option<&CompletionOptions>,
        ) -> edgequake_llm::Result<LLMResponse> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(delay) = self.delay {
                sleep(delay).await;
            }
            if call <= self.failures {
                return Err(LlmError::ApiError(format!("failure {call}")));
            }
            Ok(LLMResponse::new("abc", "flaky-model").with_usage(3, 1))
        }

        async fn stream(
            &self,
            _prompt: &str,
        ) -> edgequake_llm::Result<BoxStream<'static, edgequake_llm::Result<String>>> {
            let tokens: Vec<edgequake_llm::Result<String>> =
                vec![Ok("a".into()), Ok("b".into()), Ok("c".into())];
            Ok(Box::pin(stream::iter(tokens)))
        }

        fn supports_streaming(&self) -> bool {
            self.streams
        }
    }

    fn config(max_retries: u32) -> StudyConfig {
        StudyConfig::builder()
            .max_retries(max_retries)
            .retry_backoff_ms(1)
            .build()
            .unwrap()
    }

    async fn collect(stream: TokenStream) -> Vec<String> {
        stream.map(|t| t.unwrap()).collect().await
    }

    #[tokio::test]
    async fn retries_until_the_provider_answers() {
        let provider = Arc::new(Flaky::new(2));
        let generator = LlmGenerator::new(provider.clone(), "flaky-model", &config(2));

        let generation = generator.generate("x").await.unwrap();
        assert_eq!(generation.text, "abc");
        assert_eq!(generation.input_tokens, 3);
        assert_eq!(generation.output_tokens, 1);
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let provider = Arc::new(Flaky::new(u32::MAX));
        let generator = LlmGenerator::new(provider.clone(), "flaky-model", &config(1));

        match generator.generate("x").await {
            Err(Lecture2CodeError::LlmApiError { attempts, message }) => {
                assert_eq!(attempts, 2);
                assert!(message.contains("failure 2"));
            }
            other => panic!("expected LlmApiError, got {other:?}"),
        }
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn fallback_is_tried_once_and_counted() {
        let primary = Arc::new(Flaky::new(u32::MAX));
        let fallback = Arc::new(Flaky::new(u32::MAX));
        let generator = LlmGenerator::new(primary.clone(), "flaky-model", &config(2))
            .with_fallback(fallback.clone());

        match generator.generate("x").await {
            Err(Lecture2CodeError::LlmApiError { attempts, .. }) => assert_eq!(attempts, 2 + 2),
            other => panic!("expected LlmApiError, got {other:?}"),
        }
        assert_eq!(primary.calls(), 3);
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test]
    async fn fallback_answer_is_returned() {
        let primary = Arc::new(Flaky::new(u32::MAX));
        let fallback = Arc::new(Flaky::new(0));
        let generator =
            LlmGenerator::new(primary, "flaky-model", &config(0)).with_fallback(fallback);

        assert_eq!(generator.generate("x").await.unwrap().text, "abc");
    }

    #[tokio::test]
    async fn slow_call_maps_to_timeout() {
        let provider = Arc::new(Flaky {
            delay: Some(Duration::from_secs(3)),
            ..Flaky::new(0)
        });
        let config = StudyConfig::builder()
            .max_retries(0)
            .api_timeout_secs(1)
            .build()
            .unwrap();
        let generator = LlmGenerator::new(provider, "flaky-model", &config);

        match generator.generate("x").await {
            Err(Lecture2CodeError::Timeout { secs }) => assert_eq!(secs, 1),
            other => panic!("expected Timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn streaming_provider_yields_its_tokens() {
        let provider = Arc::new(Flaky {
            streams: true,
            ..Flaky::new(0)
        });
        let generator = LlmGenerator::new(provider.clone(), "flaky-model", &config(0));

        let tokens = collect(generator.generate_stream("x").await.unwrap()).await;
        assert_eq!(tokens, vec!["a", "b", "c"]);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn non_streaming_provider_falls_back_to_generate() {
        let provider = Arc::new(Flaky::new(0));
        let generator = LlmGenerator::new(provider.clone(), "flaky-model", &config(0));

        let tokens = collect(generator.generate_stream("x").await.unwrap()).await;
        assert_eq!(tokens, vec!["abc"]);
        assert_eq!(provider.calls(), 1);
    }

    #[test]
    fn build_options_defaults() {
        let config = StudyConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.2));
        assert_eq!(opts.max_tokens, Some(4096));
    }

    #[tokio::test]
    async fn default_stream_yields_whole_output_once() {
        let tokens = collect(Echo.generate_stream("hi there").await.unwrap()).await;
        assert_eq!(tokens, vec!["HI THERE".to_string()]);
    }
}
