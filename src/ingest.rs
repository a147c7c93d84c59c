//! Ingestion pipeline: file → segments → chunks → embeddings → vector store.
//!
//! Each file is ingested independently. Chunks are embedded in batches and
//! appended to the store in order; the first failure stops that file and
//! reports how many of its chunks were already stored. Stored chunks are
//! never replaced, so ingesting the same file twice keeps two copies.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use orinda_core::chunk::{chunk_segments, ChunkingParams};
use orinda_core::embedding::EmbeddingProvider;
use orinda_core::store::VectorStore;
use orinda_core::{IngestFailure, OrindaError};

use crate::loader;
use crate::progress::{IngestProgressEvent, IngestProgressReporter, NoProgress};

/// Directories never descended into when a folder is ingested.
const DEFAULT_EXCLUDES: &[&str] = &["**/.git/**", "**/node_modules/**", "**/target/**"];

/// Outcome of [`Ingestor::ingest_paths`].
#[derive(Debug, Default)]
pub struct IngestSummary {
    /// Files fully stored, with their chunk counts.
    pub ingested: Vec<(PathBuf, usize)>,
    pub failures: Vec<IngestFailure>,
}

impl IngestSummary {
    pub fn total_chunks(&self) -> usize {
        self.ingested.iter().map(|(_, n)| n).sum::<usize>()
            + self.failures.iter().map(|f| f.stored).sum::<usize>()
    }
}

#[derive(Clone)]
pub struct Ingestor {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    chunking: ChunkingParams,
    batch_size: usize,
}

impl Ingestor {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        chunking: ChunkingParams,
        batch_size: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            chunking,
            batch_size: batch_size.max(1),
        }
    }

    /// Ingest one file and return the number of chunks stored.
    pub async fn ingest(&self, path: &Path) -> Result<usize, IngestFailure> {
        self.ingest_with_progress(path, &NoProgress).await
    }

    pub async fn ingest_with_progress(
        &self,
        path: &Path,
        progress: &dyn IngestProgressReporter,
    ) -> Result<usize, IngestFailure> {
        let file = path.to_path_buf();
        progress.report(IngestProgressEvent::Loading { file: file.clone() });

        let load_path = file.clone();
        let segments = tokio::task::spawn_blocking(move || loader::load_document(&load_path))
            .await
            .map_err(|e| {
                IngestFailure::new(
                    &file,
                    0,
                    OrindaError::DocumentLoad {
                        file: loader::source_name(&file),
                        reason: format!("loader task failed: {}", e),
                    },
                )
            })?
            .map_err(|e| IngestFailure::new(&file, 0, e))?;

        let chunks = chunk_segments(&segments, &self.chunking);
        let total = chunks.len();
        tracing::info!(file = %file.display(), segments = segments.len(), chunks = total, "loaded document");

        let mut stored = 0usize;
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self
                .embedder
                .embed(&texts)
                .await
                .map_err(|e| IngestFailure::new(&file, stored, e))?;

            if vectors.len() != batch.len() {
                return Err(IngestFailure::new(
                    &file,
                    stored,
                    OrindaError::InvalidResponse(format!(
                        "expected {} embeddings, got {}",
                        batch.len(),
                        vectors.len()
                    )),
                ));
            }

            for (chunk, vector) in batch.iter().zip(vectors) {
                let chunk = chunk.clone().with_embedding(vector);
                self.store
                    .add(&chunk)
                    .await
                    .map_err(|e| IngestFailure::new(&file, stored, e))?;
                stored += 1;
            }

            progress.report(IngestProgressEvent::Embedding {
                file: file.clone(),
                done: stored,
                total,
            });
        }

        progress.report(IngestProgressEvent::Finished {
            file: file.clone(),
            stored,
        });
        tracing::info!(file = %file.display(), stored, "ingested document");
        Ok(stored)
    }

    /// Ingest files and directories. Directories are walked recursively
    /// and filtered to supported extensions. A failing file does not stop
    /// the others.
    pub async fn ingest_paths(
        &self,
        paths: &[PathBuf],
        progress: &dyn IngestProgressReporter,
    ) -> IngestSummary {
        let mut summary = IngestSummary::default();
        let (files, walk_failures) = expand_paths(paths);
        summary.failures.extend(walk_failures);

        for file in files {
            match self.ingest_with_progress(&file, progress).await {
                Ok(n) => summary.ingested.push((file, n)),
                Err(failure) => {
                    tracing::warn!(error = %failure, "ingestion failed");
                    summary.failures.push(failure);
                }
            }
        }
        summary
    }

    /// Delete every stored chunk of `source_file`.
    pub async fn forget(&self, source_file: &str) -> Result<usize, OrindaError> {
        let removed = self.store.delete_source(source_file).await?;
        tracing::info!(source_file, removed, "forgot source");
        Ok(removed)
    }
}

/// Resolve the arguments of `/ingest` into a file list.
///
/// Files are kept as given (an unsupported one fails later with
/// [`OrindaError::UnsupportedFormat`]); directories contribute their
/// supported files in sorted order.
pub fn expand_paths(paths: &[PathBuf]) -> (Vec<PathBuf>, Vec<IngestFailure>) {
    let mut files = Vec::new();
    let mut failures = Vec::new();

    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }
        match scan_directory(path) {
            Ok(mut found) => {
                found.sort();
                files.append(&mut found);
            }
            Err(reason) => failures.push(IngestFailure::new(
                path,
                0,
                OrindaError::DocumentLoad {
                    file: path.display().to_string(),
                    reason,
                },
            )),
        }
    }
    (files, failures)
}

fn scan_directory(root: &Path) -> Result<Vec<PathBuf>, String> {
    let exclude_set = build_globset(DEFAULT_EXCLUDES).map_err(|e| e.to_string())?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) || !loader::is_supported(path) {
            continue;
        }
        files.push(path.to_path_buf());
    }
    Ok(files)
}

fn build_globset(patterns: &[&str]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    builder.build()
}
