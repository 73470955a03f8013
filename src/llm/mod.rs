pub mod client;
pub mod gemini;
pub mod ollama;

use std::sync::Arc;

use anyhow::Result;

use crate::config::LlmConfig;

pub use client::{LlmClient, LlmError};
pub use gemini::GeminiClient;
pub use ollama::OllamaClient;

/// Builds the client selected by `[llm] provider`.
pub fn build_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    let client: Arc<dyn LlmClient> = match config.provider.as_str() {
        "gemini" => Arc::new(GeminiClient::new(config.clone())?),
        "ollama" => Arc::new(OllamaClient::new(config.clone())?),
        other => anyhow::bail!(
            "Unsupported LLM provider: '{other}'. Supported: 'gemini', 'ollama'."
        ),
    };
    Ok(client)
}

/// Shared HTTP client with the configured request timeout.
fn http_client(config: &LlmConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = config.timeout() {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
pub(crate) fn test_config(provider: &str, model: &str) -> LlmConfig {
    LlmConfig {
        provider: provider.to_string(),
        model: model.to_string(),
        api_key: "test-key".to_string(),
        host: None,
        timeout_secs: 60,
        max_output_tokens: 1024,
    }
}
