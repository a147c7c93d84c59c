//! Application context: every long-lived service, built once from
//! [`Config`] and shared by the dispatcher and the session.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use orinda_core::embedding::EmbeddingProvider;
use orinda_core::models::{ModelSelection, RetrievalResult};
use orinda_core::prompt::build_prompt;
use orinda_core::retrieve::retrieve;
use orinda_core::store::VectorStore;
use orinda_core::OrindaError;

use crate::config::Config;
use crate::conversation::ConversationStore;
use crate::embedding::OllamaEmbedder;
use crate::inference::{InferenceClient, OllamaClient};
use crate::ingest::Ingestor;
use crate::sqlite_store::SqliteVectorStore;

/// A retrieval-augmented reply and the chunks it was grounded on.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<RetrievalResult>,
}

pub struct AppContext {
    pub config: Config,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    inference: Arc<dyn InferenceClient>,
    conversations: ConversationStore,
}

impl AppContext {
    pub fn new(
        config: Config,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        inference: Arc<dyn InferenceClient>,
        conversations: ConversationStore,
    ) -> Self {
        Self {
            config,
            embedder,
            store,
            inference,
            conversations,
        }
    }

    /// Open both SQLite files and build the Ollama clients. Any failure here
    /// is fatal to startup.
    pub async fn open(config: Config) -> Result<Self> {
        let embedder = OllamaEmbedder::new(&config.embedding)
            .context("Failed to build embedding client")?;
        let inference =
            OllamaClient::new(&config.inference).context("Failed to build chat client")?;
        let store = SqliteVectorStore::open(&config).await.with_context(|| {
            format!(
                "Failed to open vector store in {}",
                config.vector_store.dir.display()
            )
        })?;
        let conversations = ConversationStore::open(&config).await.with_context(|| {
            format!(
                "Failed to open conversation history at {}",
                config.db.path.display()
            )
        })?;

        tracing::info!(
            collection = %store.collection(),
            embedding_model = %config.embedding.model,
            "context ready"
        );

        Ok(Self::new(
            config,
            Arc::new(embedder),
            Arc::new(store),
            Arc::new(inference),
            conversations,
        ))
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// The model selected at startup.
    pub fn default_model(&self) -> Result<ModelSelection, OrindaError> {
        self.select_model(&self.config.inference.default_model)
    }

    pub fn select_model(&self, name: &str) -> Result<ModelSelection, OrindaError> {
        ModelSelection::select(name, &self.config.inference.models)
    }

    pub fn ingestor(&self) -> Ingestor {
        Ingestor::new(
            self.embedder.clone(),
            self.store.clone(),
            self.config.chunking.params(),
            self.config.embedding.batch_size,
        )
    }

    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievalResult>, OrindaError> {
        retrieve(
            self.embedder.as_ref(),
            self.store.as_ref(),
            query,
            &self.config.retrieval.params(),
        )
        .await
    }

    /// Plain chat: the text goes to the model unchanged.
    pub async fn complete(&self, text: &str, model: &ModelSelection) -> Result<String, OrindaError> {
        self.inference.complete(text, model).await
    }

    /// Retrieve, assemble the prompt and ask the model.
    pub async fn ask(&self, query: &str, model: &ModelSelection) -> Result<Answer, OrindaError> {
        let sources = self.retrieve(query).await?;
        tracing::debug!(matches = sources.len(), "retrieved context");
        let prompt = build_prompt(query, &sources);
        let text = self.inference.complete(&prompt, model).await?;
        Ok(Answer { text, sources })
    }
}
