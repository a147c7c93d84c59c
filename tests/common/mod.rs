//! Shared fixtures: a fake Ollama server, a deterministic embedder and
//! config builders pointing everything at a temp directory.

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use orinda::config::Config;
use orinda_core::embedding::EmbeddingProvider;
use orinda_core::OrindaError;

pub const DIMS: usize = 256;
pub const SERVED_MODEL: &str = "llama3.2:latest";

/// Bag-of-words vector: each lowercase alphanumeric word adds 1 to a
/// hashed bucket. Identical texts have similarity 1.0; texts with no
/// words in common are near 0.
pub fn bag_of_words(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let mut hash: u64 = 0xcbf29ce484222325;
        for b in word.to_lowercase().bytes() {
            hash ^= b as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        v[(hash % DIMS as u64) as usize] += 1.0;
    }
    v
}

pub struct HashEmbedder;

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn model_name(&self) -> &str {
        "bag-of-words"
    }
    fn dims(&self) -> usize {
        DIMS
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, OrindaError> {
        Ok(texts.iter().map(|t| bag_of_words(t)).collect())
    }
}

/// Requests seen by the fake server.
#[derive(Default)]
pub struct FakeOllama {
    pub prompts: Mutex<Vec<String>>,
    pub embed_calls: Mutex<usize>,
}

impl FakeOllama {
    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

async fn embed(State(state): State<Arc<FakeOllama>>, Json(body): Json<Value>) -> Json<Value> {
    *state.embed_calls.lock().unwrap() += 1;
    let inputs: Vec<String> = match &body["input"] {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    };
    let embeddings: Vec<Vec<f32>> = inputs.iter().map(|t| bag_of_words(t)).collect();
    Json(json!({ "model": body["model"], "embeddings": embeddings }))
}

async fn chat(
    State(state): State<Arc<FakeOllama>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let model = body["model"].as_str().unwrap_or_default().to_string();
    if model != SERVED_MODEL {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("model '{}' not found", model) })),
        );
    }
    let prompt = body["messages"][0]["content"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    state.prompts.lock().unwrap().push(prompt.clone());
    let reply = format!("reply #{} from {}", state.prompts.lock().unwrap().len(), model);
    (
        StatusCode::OK,
        Json(json!({
            "model": model,
            "message": { "role": "assistant", "content": reply },
            "done": true
        })),
    )
}

/// Start the fake server on an ephemeral port; returns its base URL.
pub async fn spawn_fake_ollama() -> (String, Arc<FakeOllama>) {
    let state = Arc::new(FakeOllama::default());
    let app = Router::new()
        .route("/api/embed", post(embed))
        .route("/api/chat", post(chat))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), state)
}

/// A port nothing listens on.
pub const DEAD_URL: &str = "http://127.0.0.1:9";

/// Config with both stores under `root` and both clients pointed at `url`.
pub fn test_config(root: &Path, url: &str) -> Config {
    let mut config = Config::default();
    config.db.path = root.join("data/chats.sqlite");
    config.vector_store.dir = root.join("data/vectors");
    config.embedding.url = url.to_string();
    config.embedding.dims = DIMS;
    config.embedding.batch_size = 4;
    config.embedding.max_retries = 0;
    config.embedding.timeout_secs = 5;
    config.inference.url = url.to_string();
    config.inference.models = vec![SERVED_MODEL.to_string(), "tiny".to_string()];
    config.inference.default_model = SERVED_MODEL.to_string();
    config.inference.timeout_secs = 5;
    config
}

pub fn write_file(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}
