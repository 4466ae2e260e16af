//! Progress ledger repository.
//!
//! Learned and difficult marks are independent sets keyed by
//! `(user_id, card_id)`: presence of a row means the mark is set.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use kartica_core::{CardId, CategoryId, UserId};

use super::RepositoryError;
use crate::models::progress::CategoryCompletion;

/// Which mark table an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkKind {
    Learned,
    Difficult,
}

impl MarkKind {
    const fn table(self) -> &'static str {
        match self {
            Self::Learned => "user_learned_cards",
            Self::Difficult => "user_difficult_cards",
        }
    }
}

/// Result of the category completion upsert.
#[derive(Debug, Clone, Copy)]
pub struct CompletionWrite {
    /// The row did not exist before this statement.
    pub inserted: bool,
    /// The stored completion timestamp after the write.
    pub completed_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct CompletionRow {
    category_id: String,
    category_title: Option<String>,
    level: Option<String>,
    completed_at: DateTime<Utc>,
}

/// Repository for per-user progress tables.
pub struct ProgressRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> ProgressRepository<'c> {
    /// Create a new progress repository over a connection or transaction.
    #[must_use]
    pub const fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// List the card ids carrying `kind` for a user, oldest mark first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_marks(
        &mut self,
        user_id: UserId,
        kind: MarkKind,
    ) -> Result<Vec<CardId>, RepositoryError> {
        let rows: Vec<(CardId,)> = sqlx::query_as(&format!(
            "SELECT card_id FROM {} WHERE user_id = $1 ORDER BY marked_at, card_id",
            kind.table()
        ))
        .bind(user_id)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(rows.into_iter().map(|(card,)| card).collect())
    }

    /// Set a mark. Returns `true` if the row was newly inserted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn insert_mark(
        &mut self,
        user_id: UserId,
        card_id: &CardId,
        kind: MarkKind,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(&format!(
            "INSERT INTO {} (user_id, card_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            kind.table()
        ))
        .bind(user_id)
        .bind(card_id)
        .execute(&mut *self.conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Clear a mark. Returns `true` if a row was removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_mark(
        &mut self,
        user_id: UserId,
        card_id: &CardId,
        kind: MarkKind,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE user_id = $1 AND card_id = $2",
            kind.table()
        ))
        .bind(user_id)
        .bind(card_id)
        .execute(&mut *self.conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Clear `kind` for every card in `card_ids`. Returns the number removed.
    ///
    /// Callers bound the slice length; see `services::progress::RESET_CHUNK_SIZE`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_marks_in(
        &mut self,
        user_id: UserId,
        card_ids: &[String],
        kind: MarkKind,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE user_id = $1 AND card_id = ANY($2)",
            kind.table()
        ))
        .bind(user_id)
        .bind(card_ids)
        .execute(&mut *self.conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Clear `kind` for every card of a user. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_all_marks(
        &mut self,
        user_id: UserId,
        kind: MarkKind,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE user_id = $1", kind.table()))
            .bind(user_id)
            .execute(&mut *self.conn)
            .await?;
        Ok(result.rows_affected())
    }

    /// Lock the completion row for a category, if present.
    ///
    /// Returns `None` when no row exists, `Some(None)` when the row exists
    /// but has never been completed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lock_completion(
        &mut self,
        user_id: UserId,
        category_id: &CategoryId,
    ) -> Result<Option<Option<DateTime<Utc>>>, RepositoryError> {
        let row: Option<(Option<DateTime<Utc>>,)> = sqlx::query_as(
            r"
            SELECT completed_at FROM user_category_progress
            WHERE user_id = $1 AND category_id = $2
            FOR UPDATE
            ",
        )
        .bind(user_id)
        .bind(category_id)
        .fetch_optional(&mut *self.conn)
        .await?;
        Ok(row.map(|(completed_at,)| completed_at))
    }

    /// Record a completion, keeping an existing `completed_at`.
    ///
    /// Title and level are refreshed when provided.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert_completion(
        &mut self,
        user_id: UserId,
        category_id: &CategoryId,
        category_title: Option<&str>,
        level: Option<&str>,
    ) -> Result<CompletionWrite, RepositoryError> {
        let (inserted, completed_at): (bool, DateTime<Utc>) = sqlx::query_as(
            r"
            INSERT INTO user_category_progress
                (user_id, category_id, category_title, level, completed_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (user_id, category_id) DO UPDATE SET
                category_title = COALESCE(EXCLUDED.category_title, user_category_progress.category_title),
                level = COALESCE(EXCLUDED.level, user_category_progress.level),
                completed_at = COALESCE(user_category_progress.completed_at, EXCLUDED.completed_at)
            RETURNING (xmax = 0) AS inserted, completed_at
            ",
        )
        .bind(user_id)
        .bind(category_id)
        .bind(category_title)
        .bind(level)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(CompletionWrite {
            inserted,
            completed_at,
        })
    }

    /// List completed categories for a user, earliest completion first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored category id is invalid.
    pub async fn list_completions(
        &mut self,
        user_id: UserId,
    ) -> Result<Vec<CategoryCompletion>, RepositoryError> {
        let rows: Vec<CompletionRow> = sqlx::query_as(
            r"
            SELECT category_id, category_title, level, completed_at
            FROM user_category_progress
            WHERE user_id = $1 AND completed_at IS NOT NULL
            ORDER BY completed_at, category_id
            ",
        )
        .bind(user_id)
        .fetch_all(&mut *self.conn)
        .await?;

        rows.into_iter()
            .map(|row| {
                let category_id = CategoryId::parse(&row.category_id).map_err(|e| {
                    RepositoryError::DataCorruption(format!("invalid category id in database: {e}"))
                })?;
                Ok(CategoryCompletion {
                    category_id,
                    category_title: row.category_title,
                    level: row.level,
                    completed_at: row.completed_at,
                })
            })
            .collect()
    }
}
