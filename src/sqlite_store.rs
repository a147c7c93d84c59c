//! SQLite-backed [`VectorStore`] implementation.
//!
//! Chunks are appended to the `chunks` table of `vectors.sqlite` inside the
//! configured store directory. Embeddings are stored as little-endian f32
//! BLOBs and searched by brute-force cosine similarity. Several collections
//! can share one file. Every query is scoped to this store's collection and
//! to the embedding model and dimensionality it was opened with, so vectors
//! written under a previous embedding config are never searched or listed.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use orinda_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use orinda_core::models::{DocumentChunk, RetrievalResult, SourceSummary};
use orinda_core::store::{rank_by_score, validated_embedding, VectorStore};
use orinda_core::OrindaError;

use crate::config::Config;
use crate::{db, migrate};

/// SQLite implementation of the [`VectorStore`] trait.
pub struct SqliteVectorStore {
    pool: SqlitePool,
    collection: String,
    model: String,
    dims: usize,
}

impl SqliteVectorStore {
    /// Wrap an already-migrated pool.
    pub fn new(
        pool: SqlitePool,
        collection: impl Into<String>,
        model: impl Into<String>,
        dims: usize,
    ) -> Self {
        Self {
            pool,
            collection: collection.into(),
            model: model.into(),
            dims,
        }
    }

    /// Open the store file under `vector_store.dir`, creating and migrating
    /// it if needed.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(&config.vector_store.db_path()).await?;
        migrate::run_vector_migrations(&pool).await?;
        let store = Self::new(
            pool,
            &config.vector_store.collection,
            &config.embedding.model,
            config.embedding.dims,
        );
        store.warn_on_stale_vectors().await?;
        Ok(store)
    }

    /// Rows in this collection written with a different model or dims.
    pub async fn stale_count(&self) -> Result<usize, OrindaError> {
        let n: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM chunks WHERE collection = ? AND (model != ? OR dims != ?)",
        )
        .bind(&self.collection)
        .bind(&self.model)
        .bind(self.dims as i64)
        .fetch_one(&self.pool)
        .await
        .map_err(read_err)?;
        Ok(n as usize)
    }

    async fn warn_on_stale_vectors(&self) -> Result<(), OrindaError> {
        let stale = self.stale_count().await?;
        if stale > 0 {
            tracing::warn!(
                collection = %self.collection,
                model = %self.model,
                dims = self.dims,
                stale,
                "chunks embedded with another model or dimensionality are ignored; re-ingest their files"
            );
        }
        Ok(())
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }
}

fn read_err(e: sqlx::Error) -> OrindaError {
    OrindaError::VectorStoreReadFailure(e.to_string())
}

fn write_err(e: sqlx::Error) -> OrindaError {
    OrindaError::VectorStoreWriteFailure(e.to_string())
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    fn dims(&self) -> usize {
        self.dims
    }

    async fn add(&self, chunk: &DocumentChunk) -> Result<(), OrindaError> {
        let embedding = validated_embedding(chunk, self.dims)?;
        let blob = vec_to_blob(embedding);

        sqlx::query(
            r#"
            INSERT INTO chunks (id, collection, source_file, chunk_index, text, hash,
                                dims, model, embedding, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&chunk.id)
        .bind(&self.collection)
        .bind(&chunk.source_file)
        .bind(chunk.chunk_index)
        .bind(&chunk.text)
        .bind(&chunk.hash)
        .bind(self.dims as i64)
        .bind(&self.model)
        .bind(&blob)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        Ok(())
    }

    async fn nearest(
        &self,
        query_vec: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievalResult>, OrindaError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT id, source_file, chunk_index, text, hash, embedding
            FROM chunks
            WHERE collection = ? AND model = ? AND dims = ?
            ORDER BY seq ASC
            "#,
        )
        .bind(&self.collection)
        .bind(&self.model)
        .bind(self.dims as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(read_err)?;

        let mut results: Vec<RetrievalResult> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vec = blob_to_vec(&blob);
                let score = cosine_similarity(query_vec, &vec);
                RetrievalResult {
                    chunk: DocumentChunk {
                        id: row.get("id"),
                        text: row.get("text"),
                        source_file: row.get("source_file"),
                        chunk_index: row.get("chunk_index"),
                        hash: row.get("hash"),
                        embedding: Some(vec),
                    },
                    score,
                }
            })
            .collect();

        rank_by_score(&mut results);
        results.truncate(k);

        Ok(results)
    }

    async fn count(&self) -> Result<usize, OrindaError> {
        let n: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM chunks WHERE collection = ? AND model = ? AND dims = ?",
        )
        .bind(&self.collection)
        .bind(&self.model)
        .bind(self.dims as i64)
        .fetch_one(&self.pool)
        .await
        .map_err(read_err)?;
        Ok(n as usize)
    }

    async fn sources(&self) -> Result<Vec<SourceSummary>, OrindaError> {
        let rows = sqlx::query(
            r#"
            SELECT source_file, COUNT(*) AS chunk_count, MIN(seq) AS first_seq
            FROM chunks
            WHERE collection = ? AND model = ? AND dims = ?
            GROUP BY source_file
            ORDER BY first_seq ASC
            "#,
        )
        .bind(&self.collection)
        .bind(&self.model)
        .bind(self.dims as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(read_err)?;

        Ok(rows
            .iter()
            .map(|row| SourceSummary {
                source_file: row.get("source_file"),
                chunk_count: row.get::<i64, _>("chunk_count") as usize,
            })
            .collect())
    }

    async fn delete_source(&self, source_file: &str) -> Result<usize, OrindaError> {
        let result = sqlx::query(
            "DELETE FROM chunks WHERE collection = ? AND model = ? AND dims = ? AND source_file = ?",
        )
        .bind(&self.collection)
        .bind(&self.model)
        .bind(self.dims as i64)
        .bind(source_file)
        .execute(&self.pool)
        .await
        .map_err(write_err)?;
        Ok(result.rows_affected() as usize)
    }
}
