//! Ollama embedding client.
//!
//! Implements [`EmbeddingProvider`] by calling `POST {url}/api/embed` on a
//! local Ollama instance. Requires an embedding model to be pulled
//! (e.g. `ollama pull nomic-embed-text`).
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - Other HTTP errors → fail immediately
//! - Connection errors and timeouts → fail immediately with
//!   [`OrindaError::EmbeddingUnavailable`]
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::time::Duration;

use async_trait::async_trait;
use orinda_core::embedding::EmbeddingProvider;
use orinda_core::OrindaError;

use crate::config::EmbeddingConfig;

/// Embedding provider backed by a local Ollama instance.
pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, OrindaError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| OrindaError::EmbeddingUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dims: config.dims,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, OrindaError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::debug!(attempt, ?delay, "retrying embedding request");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(format!("{}/api/embed", self.url))
                .json(&body)
                .send()
                .await
                .map_err(|e| {
                    OrindaError::EmbeddingUnavailable(format!(
                        "Ollama connection error (is Ollama running at {}?): {}",
                        self.url, e
                    ))
                })?;

            let status = resp.status();

            if status.is_success() {
                let json: serde_json::Value = resp
                    .json()
                    .await
                    .map_err(|e| OrindaError::InvalidResponse(e.to_string()))?;
                let vectors = parse_ollama_response(&json)?;
                return self.check_shape(vectors, texts.len());
            }

            let body_text = resp.text().await.unwrap_or_default();
            let err = OrindaError::EmbeddingUnavailable(format!(
                "Ollama API error {}: {}",
                status, body_text
            ));

            if status.as_u16() == 429 || status.is_server_error() {
                tracing::warn!(%status, "embedding request failed");
                last_err = Some(err);
                continue;
            }

            return Err(err);
        }

        Err(last_err.unwrap_or_else(|| {
            OrindaError::EmbeddingUnavailable("Ollama embedding failed after retries".into())
        }))
    }
}

impl OllamaEmbedder {
    fn check_shape(
        &self,
        vectors: Vec<Vec<f32>>,
        expected: usize,
    ) -> Result<Vec<Vec<f32>>, OrindaError> {
        if vectors.len() != expected {
            return Err(OrindaError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                expected,
                vectors.len()
            )));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dims) {
            return Err(OrindaError::InvalidResponse(format!(
                "model {} returned {}-dimensional embeddings, configured dims is {}",
                self.model,
                bad.len(),
                self.dims
            )));
        }
        Ok(vectors)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, OrindaError> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| {
            OrindaError::InvalidResponse("Invalid Ollama response: missing embeddings array".into())
        })?;

    let mut result = Vec::with_capacity(embeddings.len());

    for embedding in embeddings {
        let vec: Vec<f32> = embedding
            .as_array()
            .ok_or_else(|| {
                OrindaError::InvalidResponse(
                    "Invalid Ollama response: embedding is not an array".into(),
                )
            })?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        result.push(vec);
    }

    Ok(result)
}
