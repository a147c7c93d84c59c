//! Saved chat transcripts.
//!
//! A [`ConversationRecord`] is stored as one `conversations` row plus one
//! `messages` row per turn. Turns are append-only, so saving a record that
//! was saved before only inserts the turns added since. Every failure maps
//! to [`OrindaError::PersistenceFailure`]; callers show it and carry on.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{Row, SqlitePool};

use orinda_core::models::{ConversationRecord, ConversationSummary, Role, Turn};
use orinda_core::OrindaError;

use crate::config::Config;
use crate::{db, migrate};

#[derive(Debug, Clone)]
pub struct ConversationStore {
    pool: SqlitePool,
}

fn persistence(e: impl std::fmt::Display) -> OrindaError {
    OrindaError::PersistenceFailure(e.to_string())
}

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, OrindaError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| persistence(format!("bad timestamp '{}': {}", raw, e)))
}

impl ConversationStore {
    /// Wrap an already-migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the history database at `db.path`, creating and migrating it if
    /// needed.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let pool = db::connect(&config.db.path).await?;
        migrate::run_conversation_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    /// Persist `record`, appending turns not yet stored. The title is
    /// updated in place. Returns how many turns were written.
    pub async fn save(&self, record: &ConversationRecord) -> Result<usize, OrindaError> {
        let mut tx = self.pool.begin().await.map_err(persistence)?;

        sqlx::query(
            r#"
            INSERT INTO conversations (id, title, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET title = excluded.title
            "#,
        )
        .bind(&record.id)
        .bind(&record.title)
        .bind(format_ts(&record.created_at))
        .execute(&mut *tx)
        .await
        .map_err(persistence)?;

        let stored: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE conversation_id = ?")
                .bind(&record.id)
                .fetch_one(&mut *tx)
                .await
                .map_err(persistence)?;

        let pending = record.turns.iter().skip(stored as usize);
        let mut written = 0;
        for turn in pending {
            sqlx::query(
                "INSERT INTO messages (conversation_id, role, text, timestamp) VALUES (?, ?, ?, ?)",
            )
            .bind(&record.id)
            .bind(turn.role.as_str())
            .bind(&turn.text)
            .bind(format_ts(&turn.timestamp))
            .execute(&mut *tx)
            .await
            .map_err(persistence)?;
            written += 1;
        }

        tx.commit().await.map_err(persistence)?;
        tracing::debug!(id = %record.id, written, "conversation saved");
        Ok(written)
    }

    /// Saved conversations, newest first.
    pub async fn list(&self) -> Result<Vec<ConversationSummary>, OrindaError> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.title, c.created_at,
                   (SELECT COUNT(*) FROM messages m WHERE m.conversation_id = c.id) AS turn_count
            FROM conversations c
            ORDER BY c.created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(persistence)?;

        rows.iter()
            .map(|row| {
                let created_at: String = row.get("created_at");
                Ok(ConversationSummary {
                    id: row.get("id"),
                    title: row.get("title"),
                    created_at: parse_ts(&created_at)?,
                    turn_count: row.get::<i64, _>("turn_count") as usize,
                })
            })
            .collect()
    }

    /// Load a full conversation with its turns in order.
    pub async fn get(&self, id: &str) -> Result<Option<ConversationRecord>, OrindaError> {
        let Some(row) = sqlx::query("SELECT id, title, created_at FROM conversations WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(persistence)?
        else {
            return Ok(None);
        };

        let messages = sqlx::query(
            "SELECT role, text, timestamp FROM messages WHERE conversation_id = ? ORDER BY id ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(persistence)?;

        let turns = messages
            .iter()
            .map(|m| {
                let role: String = m.get("role");
                let timestamp: String = m.get("timestamp");
                Ok(Turn {
                    role: role.parse::<Role>()?,
                    text: m.get("text"),
                    timestamp: parse_ts(&timestamp)?,
                })
            })
            .collect::<Result<Vec<_>, OrindaError>>()?;

        let created_at: String = row.get("created_at");
        Ok(Some(ConversationRecord {
            id: row.get("id"),
            title: row.get("title"),
            created_at: parse_ts(&created_at)?,
            turns,
        }))
    }

    /// Delete a conversation and its messages. Returns false when no such
    /// conversation exists.
    pub async fn delete(&self, id: &str) -> Result<bool, OrindaError> {
        let result = sqlx::query("DELETE FROM conversations WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(persistence)?;
        Ok(result.rows_affected() > 0)
    }

    /// Resolve a full id or a unique id prefix, as typed in `/load`.
    pub async fn resolve_id(&self, prefix: &str) -> Result<Option<String>, OrindaError> {
        let pattern = format!("{}%", prefix.replace('%', "").replace('_', "\\_"));
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT id FROM conversations WHERE id LIKE ? ESCAPE '\\' LIMIT 2")
                .bind(pattern)
                .fetch_all(&self.pool)
                .await
                .map_err(persistence)?;
        match ids.as_slice() {
            [only] => Ok(Some(only.clone())),
            [] => Ok(None),
            _ => Err(OrindaError::PersistenceFailure(format!(
                "id prefix '{}' is ambiguous",
                prefix
            ))),
        }
    }
}
