//! Core data models used throughout Orinda.
//!
//! These types represent the loaded text, chunks, retrieval results and
//! chat transcripts that flow through the ingestion and query paths.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::OrindaError;

/// Longest title kept for a saved conversation, in characters.
pub const MAX_TITLE_LEN: usize = 160;

/// One unit of text produced by a loader (a PDF, a sheet, a markdown file).
#[derive(Debug, Clone, PartialEq)]
pub struct RawSegment {
    pub text: String,
    pub source_file: String,
    pub segment_index: usize,
}

/// A bounded span of document text, optionally carrying its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChunk {
    pub id: String,
    pub text: String,
    pub source_file: String,
    pub chunk_index: i64,
    /// SHA-256 of `text`, lowercase hex.
    pub hash: String,
    pub embedding: Option<Vec<f32>>,
}

impl DocumentChunk {
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// A stored chunk paired with its similarity to a query.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    pub chunk: DocumentChunk,
    pub score: f32,
}

/// Per-file chunk counts in the vector store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSummary {
    pub source_file: String,
    pub chunk_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }

    /// Label used when rendering a transcript.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Assistant => "LLM",
            Role::System => "System",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = OrindaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            other => Err(OrindaError::PersistenceFailure(format!(
                "unknown message role '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// A chat transcript. Turns are only ever appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub turns: Vec<Turn>,
}

impl ConversationRecord {
    /// Start an empty conversation with a fresh id.
    pub fn new(title: impl Into<String>) -> Self {
        let created_at = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: normalize_title(&title.into(), created_at),
            created_at,
            turns: Vec::new(),
        }
    }

    pub fn push(&mut self, role: Role, text: impl Into<String>) {
        self.turns.push(Turn {
            role,
            text: text.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = normalize_title(title, self.created_at);
    }

    /// Plain-text rendering, one `Label: text` block per turn.
    pub fn transcript(&self) -> String {
        self.turns
            .iter()
            .map(|t| format!("{}: {}", t.role.label(), t.text))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Listing entry for a saved conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub turn_count: usize,
}

fn normalize_title(title: &str, created_at: DateTime<Utc>) -> String {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return format!("Chat {}", created_at.format("%Y-%m-%d %H:%M:%S"));
    }
    trimmed.chars().take(MAX_TITLE_LEN).collect()
}

/// The chat model a request is sent to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelSelection {
    pub name: String,
}

impl ModelSelection {
    /// Select `name` from the locally available models.
    pub fn select(name: &str, available: &[String]) -> Result<Self, OrindaError> {
        let name = name.trim();
        if available.iter().any(|m| m == name) {
            Ok(Self {
                name: name.to_string(),
            })
        } else {
            Err(OrindaError::ModelNotFound(format!(
                "'{}' is not one of: {}",
                name,
                available.join(", ")
            )))
        }
    }
}

impl fmt::Display for ModelSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
