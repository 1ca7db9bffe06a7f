//! Error types for the lecture2code library.
//!
//! The Markdown repair and cell segmentation passes are total functions and
//! never produce an error. Everything that *can* fail lives at the edges:
//! talking to the model, looking up a session, serialising a notebook, or
//! writing it to disk. Those failures are fatal for the request that hit them
//! and are returned as [`Lecture2CodeError`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the lecture2code library.
#[derive(Debug, Error)]
pub enum Lecture2CodeError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The caller supplied an empty or otherwise unusable input.
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The model call failed on the primary provider, after all retries,
    /// and on the fallback provider when one is configured.
    #[error("LLM API error after {attempts} attempt(s): {message}")]
    LlmApiError { attempts: u32, message: String },

    /// A single model call exceeded the configured timeout.
    #[error("LLM call timed out after {secs}s")]
    Timeout { secs: u64 },

    // ── Session errors ────────────────────────────────────────────────────
    /// No live session exists for this id (never created, or expired).
    #[error("Session '{id}' not found or has expired")]
    SessionNotFound { id: String },

    /// The session holds document notes, which have no notebook form.
    #[error("Session '{id}' holds document notes and cannot be exported as a notebook")]
    NotExportable { id: String },

    // ── Export errors ─────────────────────────────────────────────────────
    /// The notebook serializer rejected the assembled document.
    #[error("Failed to serialise notebook: {0}")]
    ExportFailed(#[from] serde_json::Error),

    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Lecture2CodeError {
    pub(crate) fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_api_error_display() {
        let e = Lecture2CodeError::LlmApiError {
            attempts: 3,
            message: "503 overloaded".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("3 attempt"), "got: {msg}");
        assert!(msg.contains("503 overloaded"), "got: {msg}");
    }

    #[test]
    fn session_not_found_display() {
        let e = Lecture2CodeError::SessionNotFound { id: "abc".into() };
        assert!(e.to_string().contains("'abc'"));
    }

    #[test]
    fn export_failed_wraps_serde_error() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let e: Lecture2CodeError = source.into();
        assert!(e.to_string().starts_with("Failed to serialise notebook"));
    }

    #[test]
    fn invalid_input_helper() {
        let e = Lecture2CodeError::invalid_input("transcript is empty");
        assert!(e.to_string().contains("transcript is empty"));
    }
}
