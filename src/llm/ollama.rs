//! Ollama API provider.
//!
//! Calls `POST {host}/api/generate` with `stream: false` so the whole
//! reply arrives in one body. Token usage comes from
//! `prompt_eval_count` / `eval_count` (may be absent).

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::client::{LlmClient, LlmError, LlmResponse};
use crate::config::LlmConfig;

/// Default Ollama API base URL.
const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";

// ── Ollama API types ─────────────────────────────────────

/// Ollama `/api/generate` request body.
#[derive(Debug, Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

/// Ollama generation options.
#[derive(Debug, Serialize)]
struct OllamaOptions {
    num_predict: u32,
}

/// Ollama `/api/generate` response.
#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

// ── OllamaClient ────────────────────────────────────────

/// Client for a local or remote Ollama server.
pub struct OllamaClient {
    client: Client,
    config: LlmConfig,
    host: String,
}

impl OllamaClient {
    /// If `config.host` is `None`, defaults to `http://localhost:11434`.
    pub fn new(config: LlmConfig) -> Result<Self> {
        let host = config
            .host
            .clone()
            .unwrap_or_else(|| DEFAULT_OLLAMA_HOST.to_string());
        // Strip trailing slash for consistent URL construction
        let host = host.trim_end_matches('/').to_string();
        Ok(Self {
            client: super::http_client(&config)?,
            config,
            host,
        })
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<LlmResponse, LlmError> {
        let request = OllamaGenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            options: OllamaOptions {
                num_predict: self.config.max_output_tokens,
            },
        };

        let url = format!("{}/api/generate", self.host);

        debug!(
            "Calling Ollama API ({}) with a {}-byte prompt",
            self.config.model,
            prompt.len()
        );

        let response = self.client.post(&url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let resp: OllamaGenerateResponse = response.json().await?;

        let input_tokens = resp.prompt_eval_count.unwrap_or(0);
        let output_tokens = resp.eval_count.unwrap_or(0);

        info!("LLM response: {input_tokens} in / {output_tokens} out tokens");

        Ok(LlmResponse {
            text: resp.response,
            input_tokens,
            output_tokens,
        })
    }

    fn description(&self) -> String {
        format!("{} ({})", self.config.provider, self.config.model)
    }
}
