//! Ingestion progress reporting.
//!
//! The pipeline emits one [`IngestProgressEvent`] per phase change and per
//! embedded batch. The interactive session forwards them over its worker
//! channel and prints [`IngestProgressEvent::describe`].

use std::path::PathBuf;

/// A single progress event for one file.
#[derive(Clone, Debug, PartialEq)]
pub enum IngestProgressEvent {
    /// Reading and parsing the file. Total unknown.
    Loading { file: PathBuf },
    /// `done` of `total` chunks embedded and stored.
    Embedding {
        file: PathBuf,
        done: usize,
        total: usize,
    },
    /// The file is fully stored.
    Finished { file: PathBuf, stored: usize },
}

impl IngestProgressEvent {
    pub fn file(&self) -> &PathBuf {
        match self {
            Self::Loading { file } | Self::Embedding { file, .. } | Self::Finished { file, .. } => {
                file
            }
        }
    }

    /// Human-friendly one-line rendering, e.g. `ingest manual.pdf  embedding  1,000 / 1,234 chunks`.
    pub fn describe(&self) -> String {
        let name = self
            .file()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file().display().to_string());
        match self {
            Self::Loading { .. } => format!("ingest {}  loading...", name),
            Self::Embedding { done, total, .. } => format!(
                "ingest {}  embedding  {} / {} chunks",
                name,
                format_number(*done as u64),
                format_number(*total as u64)
            ),
            Self::Finished { stored, .. } => format!(
                "ingest {}  done  {} chunks stored",
                name,
                format_number(*stored as u64)
            ),
        }
    }
}

/// Receives progress from the ingestion pipeline.
pub trait IngestProgressReporter: Send + Sync {
    fn report(&self, event: IngestProgressEvent);
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl IngestProgressReporter for NoProgress {
    fn report(&self, _event: IngestProgressEvent) {}
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}
