//! Chat completion against an Ollama-compatible server.
//!
//! One request per call, non-streaming, no retries: a failed call is
//! reported to the user, who decides whether to send again.

use std::time::Duration;

use async_trait::async_trait;
use orinda_core::models::ModelSelection;
use orinda_core::OrindaError;
use serde::Deserialize;

use crate::config::InferenceConfig;

/// Generates a reply for a single prompt.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Send `prompt` as a single user message to `model` and return the
    /// assistant's reply text.
    ///
    /// # Errors
    ///
    /// - [`OrindaError::InferenceUnavailable`] on connection failure, timeout
    ///   or a non-success status other than 404.
    /// - [`OrindaError::ModelNotFound`] when the server answers 404.
    /// - [`OrindaError::InvalidResponse`] when the body cannot be parsed.
    async fn complete(&self, prompt: &str, model: &ModelSelection) -> Result<String, OrindaError>;
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

/// [`InferenceClient`] calling `POST {url}/api/chat`.
#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(config: &InferenceConfig) -> Result<Self, OrindaError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| OrindaError::InferenceUnavailable(e.to_string()))?;
        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl InferenceClient for OllamaClient {
    async fn complete(&self, prompt: &str, model: &ModelSelection) -> Result<String, OrindaError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = serde_json::json!({
            "model": model.name,
            "messages": [{"role": "user", "content": prompt}],
            "stream": false,
        });

        tracing::debug!(model = %model.name, chars = prompt.len(), "sending chat request");

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let kind = if e.is_timeout() { "timed out" } else { "connection error" };
                OrindaError::InferenceUnavailable(format!(
                    "Ollama {} (is Ollama running at {}?): {}",
                    kind, self.base_url, e
                ))
            })?;

        let status = res.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(OrindaError::ModelNotFound(model.name.clone()));
        }
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(OrindaError::InferenceUnavailable(format!(
                "Ollama chat error {}: {}",
                status, text
            )));
        }

        let payload: ChatResponse = res.json().await.map_err(|e| {
            if e.is_timeout() {
                OrindaError::InferenceUnavailable(format!("Ollama timed out: {}", e))
            } else {
                OrindaError::InvalidResponse(format!("Invalid Ollama chat response: {}", e))
            }
        })?;

        Ok(payload.message.content)
    }
}
