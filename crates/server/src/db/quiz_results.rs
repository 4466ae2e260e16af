//! Quiz result repository. Rows are inserted and bulk-deleted, never updated.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use kartica_core::{QuizKey, QuizResultId, UserId};

use super::{RepositoryError, map_constraint_violation};
use crate::models::quiz::{NewQuizResult, QuizResult};

#[derive(sqlx::FromRow)]
struct QuizResultRow {
    id: i64,
    quiz_id: String,
    category_title: String,
    level: String,
    correct_count: i32,
    incorrect_count: i32,
    total_questions: i32,
    completed_at: DateTime<Utc>,
}

impl TryFrom<QuizResultRow> for QuizResult {
    type Error = RepositoryError;

    fn try_from(row: QuizResultRow) -> Result<Self, Self::Error> {
        let quiz_id = QuizKey::parse(&row.quiz_id).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid quiz id in database: {e}"))
        })?;

        Ok(Self {
            id: QuizResultId::new(row.id),
            quiz_id,
            category_title: row.category_title,
            level: row.level,
            correct_count: row.correct_count,
            incorrect_count: row.incorrect_count,
            total_questions: row.total_questions,
            completed_at: row.completed_at,
        })
    }
}

/// Repository for quiz results.
pub struct QuizResultRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> QuizResultRepository<'c> {
    /// Create a new quiz result repository over a connection or transaction.
    #[must_use]
    pub const fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// Append a quiz attempt.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::ConstraintViolation` if the counts violate
    /// the table's CHECK constraints.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn insert(
        &mut self,
        user_id: UserId,
        result: &NewQuizResult,
    ) -> Result<QuizResultId, RepositoryError> {
        let (id,): (i64,) = sqlx::query_as(
            r"
            INSERT INTO quiz_results
                (user_id, quiz_id, category_title, level,
                 correct_count, incorrect_count, total_questions)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            ",
        )
        .bind(user_id)
        .bind(&result.quiz_id)
        .bind(&result.category_title)
        .bind(&result.level)
        .bind(result.correct)
        .bind(result.incorrect)
        .bind(result.total)
        .fetch_one(&mut *self.conn)
        .await
        .map_err(map_constraint_violation)?;

        Ok(QuizResultId::new(id))
    }

    /// List a user's attempts, newest first. Ties on `completed_at` are
    /// broken by insertion order, latest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored row is invalid.
    pub async fn list_for_user(
        &mut self,
        user_id: UserId,
    ) -> Result<Vec<QuizResult>, RepositoryError> {
        let rows: Vec<QuizResultRow> = sqlx::query_as(
            r"
            SELECT id, quiz_id, category_title, level,
                   correct_count, incorrect_count, total_questions, completed_at
            FROM quiz_results
            WHERE user_id = $1
            ORDER BY completed_at DESC, id DESC
            ",
        )
        .bind(user_id)
        .fetch_all(&mut *self.conn)
        .await?;

        rows.into_iter().map(QuizResult::try_from).collect()
    }

    /// Delete every attempt of a user. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_all_for_user(&mut self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM quiz_results WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *self.conn)
            .await?;
        Ok(result.rows_affected())
    }
}
