//! Database operations for the Kartica `PostgreSQL` schema.
//!
//! ## Tables
//!
//! - `users` - Local and federated accounts
//! - `user_learned_cards` / `user_difficult_cards` - Per-card marks
//! - `user_category_progress` - Category completion (first completion wins)
//! - `quiz_results` - Append-only quiz attempts
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p kartica-cli -- migrate
//! ```
//!
//! # Unit of work
//!
//! Repositories borrow a `&mut PgConnection`, so the same repository code runs
//! against a pooled connection for single reads or against a transaction via
//! [`in_transaction`] for dependent read/write sequences.

pub mod progress;
pub mod quiz_results;
pub mod users;

use std::time::Duration;

use futures::future::BoxFuture;
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;

pub use progress::ProgressRepository;
pub use quiz_results::QuizResultRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database query failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in database is invalid or corrupted.
    #[error("data integrity error: {0}")]
    DataCorruption(String),

    /// Record not found.
    #[error("not found")]
    NotFound,

    /// Unique constraint violation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// CHECK constraint violation.
    #[error("constraint violated: {0}")]
    ConstraintViolation(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Run `f` inside a single database transaction.
///
/// Commits when `f` returns `Ok`. On `Err` the transaction is rolled back
/// explicitly before the error is returned; a failed rollback is logged and
/// the original error still wins.
///
/// ```ignore
/// let user = db::in_transaction(&pool, move |conn| {
///     Box::pin(async move { UserRepository::new(conn).get_by_id(id).await })
/// })
/// .await?;
/// ```
///
/// # Errors
///
/// Returns the error produced by `f`, or a `RepositoryError::Database`
/// (converted into `E`) if the transaction cannot begin or commit.
pub async fn in_transaction<T, E, F>(pool: &PgPool, f: F) -> Result<T, E>
where
    T: Send,
    E: From<RepositoryError> + Send,
    F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, Result<T, E>> + Send,
{
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| E::from(RepositoryError::Database(e)))?;

    match f(&mut *tx).await {
        Ok(value) => {
            tx.commit()
                .await
                .map_err(|e| E::from(RepositoryError::Database(e)))?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!(error = %rollback_err, "Failed to roll back transaction");
            }
            Err(err)
        }
    }
}

/// Map constraint violations to `Conflict` (unique) or
/// `ConstraintViolation` (CHECK).
///
/// The constraint name is carried in the message so callers can tell which
/// column collided.
pub(crate) fn map_constraint_violation(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e {
        let constraint = db_err.constraint().unwrap_or_default().to_owned();
        if db_err.is_unique_violation() {
            return RepositoryError::Conflict(constraint);
        }
        if db_err.is_check_violation() {
            return RepositoryError::ConstraintViolation(constraint);
        }
    }
    RepositoryError::Database(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_database_errors_are_not_conflicts() {
        let err = map_constraint_violation(sqlx::Error::RowNotFound);
        assert!(matches!(err, RepositoryError::Database(_)));
    }

    #[test]
    fn test_repository_error_display() {
        assert_eq!(
            RepositoryError::Conflict("users_email_key".to_owned()).to_string(),
            "conflict: users_email_key"
        );
        assert_eq!(RepositoryError::NotFound.to_string(), "not found");
    }
}
