//! `LlmClient` trait: abstraction over generative model backends.
//!
//! Providers (Gemini, Ollama) implement this trait so the recommender
//! can be configured to use any supported backend via the
//! `[llm] provider` config field.

use async_trait::async_trait;
use thiserror::Error;

/// Text reply of a single-shot generation call.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Error)]
pub enum LlmError {
    /// Connection, TLS, timeout or body read failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The API answered with a non-success status.
    #[error("API error ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// Success status but a body we could not use (bad JSON, no text, blocked prompt).
    #[error("malformed API response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            LlmError::Malformed(err.to_string())
        } else {
            LlmError::Transport(err.to_string())
        }
    }
}

/// Abstraction over generative model backends.
///
/// One prompt in, the full text reply out. No streaming, no retry.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<LlmResponse, LlmError>;

    /// Human-readable description of the provider and model.
    ///
    /// Used in status output, e.g. `"gemini (gemini-1.5-flash-latest)"`.
    fn description(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time verification that `LlmClient` is object-safe.
    #[test]
    fn test_llm_client_is_object_safe() {
        fn _assert_object_safe(_: &dyn LlmClient) {}
    }

    #[test]
    fn test_error_display() {
        let err = LlmError::Rejected {
            status: 403,
            body: "API key not valid".to_string(),
        };
        assert_eq!(err.to_string(), "API error (403): API key not valid");
        assert_eq!(
            LlmError::Transport("timed out".to_string()).to_string(),
            "transport error: timed out"
        );
    }
}
