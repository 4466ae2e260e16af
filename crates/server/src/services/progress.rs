//! Progress ledger.
//!
//! Per-user learned and difficult card marks plus category completion.
//! Toggles are idempotent and report whether anything changed. Whether
//! difficult cards count toward completion percentages is decided by readers
//! of this data, not here.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use thiserror::Error;

use kartica_core::{CardId, CategoryId, KeyError, UserId};

use crate::db::progress::MarkKind;
use crate::db::{self, ProgressRepository, RepositoryError};
use crate::models::progress::CategoryCompletion;

/// Maximum card ids per `DELETE … = ANY($2)` statement in a bulk reset.
pub const RESET_CHUNK_SIZE: usize = 500;

const MAX_CATEGORY_TITLE_LENGTH: usize = 255;
const MAX_LEVEL_LENGTH: usize = 10;

/// Errors from progress ledger operations.
#[derive(Debug, Error)]
pub enum ProgressError {
    /// Malformed card or category id.
    #[error("{0}")]
    InvalidKey(#[from] KeyError),

    /// Other malformed input.
    #[error("{0}")]
    InvalidInput(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Progress ledger service.
pub struct ProgressLedger<'a> {
    pool: &'a PgPool,
}

impl<'a> ProgressLedger<'a> {
    /// Create a new progress ledger.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Card ids the user has marked learned.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Repository` on storage failure.
    pub async fn learned_cards(&self, user_id: UserId) -> Result<Vec<CardId>, ProgressError> {
        self.list_marks(user_id, MarkKind::Learned).await
    }

    /// Card ids the user has marked difficult.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Repository` on storage failure.
    pub async fn difficult_cards(&self, user_id: UserId) -> Result<Vec<CardId>, ProgressError> {
        self.list_marks(user_id, MarkKind::Difficult).await
    }

    async fn list_marks(
        &self,
        user_id: UserId,
        kind: MarkKind,
    ) -> Result<Vec<CardId>, ProgressError> {
        let mut conn = self.pool.acquire().await.map_err(RepositoryError::from)?;
        Ok(ProgressRepository::new(&mut conn)
            .list_marks(user_id, kind)
            .await?)
    }

    /// Categories the user has completed, earliest first.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Repository` on storage failure.
    pub async fn completed_categories(
        &self,
        user_id: UserId,
    ) -> Result<Vec<CategoryCompletion>, ProgressError> {
        let mut conn = self.pool.acquire().await.map_err(RepositoryError::from)?;
        Ok(ProgressRepository::new(&mut conn)
            .list_completions(user_id)
            .await?)
    }

    /// Mark or unmark a card as learned. Returns whether the state changed.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Repository` on storage failure.
    pub async fn set_learned(
        &self,
        user_id: UserId,
        card_id: &CardId,
        learned: bool,
    ) -> Result<bool, ProgressError> {
        self.set_mark(user_id, card_id, MarkKind::Learned, learned)
            .await
    }

    /// Mark or unmark a card as difficult. Returns whether the state changed.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Repository` on storage failure.
    pub async fn set_difficult(
        &self,
        user_id: UserId,
        card_id: &CardId,
        difficult: bool,
    ) -> Result<bool, ProgressError> {
        self.set_mark(user_id, card_id, MarkKind::Difficult, difficult)
            .await
    }

    async fn set_mark(
        &self,
        user_id: UserId,
        card_id: &CardId,
        kind: MarkKind,
        on: bool,
    ) -> Result<bool, ProgressError> {
        let mut conn = self.pool.acquire().await.map_err(RepositoryError::from)?;
        let mut repo = ProgressRepository::new(&mut conn);

        let changed = if on {
            repo.insert_mark(user_id, card_id, kind).await?
        } else {
            repo.delete_mark(user_id, card_id, kind).await?
        };

        tracing::debug!(%user_id, %card_id, ?kind, on, changed, "Card mark set");
        Ok(changed)
    }

    /// Unmark many cards as learned in one transaction.
    ///
    /// Returns the number of marks removed. Unknown or unmarked ids are
    /// ignored; duplicates count once.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::InvalidInput` if `card_ids` is empty and
    /// `ProgressError::Repository` on storage failure (nothing is removed).
    pub async fn reset_learned(
        &self,
        user_id: UserId,
        card_ids: Vec<CardId>,
    ) -> Result<u64, ProgressError> {
        if card_ids.is_empty() {
            return Err(ProgressError::InvalidInput(
                "card ids must not be empty".to_owned(),
            ));
        }

        let chunks = chunk_card_ids(card_ids);
        let removed = db::in_transaction(self.pool, move |conn| {
            Box::pin(async move {
                let mut repo = ProgressRepository::new(conn);
                let mut removed = 0;
                for chunk in &chunks {
                    removed += repo
                        .delete_marks_in(user_id, chunk, MarkKind::Learned)
                        .await?;
                }
                Ok::<_, ProgressError>(removed)
            })
        })
        .await?;

        tracing::info!(%user_id, removed, "Learned marks reset");
        Ok(removed)
    }

    /// Unmark every learned card. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Repository` on storage failure.
    pub async fn reset_all_learned(&self, user_id: UserId) -> Result<u64, ProgressError> {
        self.reset_all(user_id, MarkKind::Learned).await
    }

    /// Unmark every difficult card. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Repository` on storage failure.
    pub async fn reset_all_difficult(&self, user_id: UserId) -> Result<u64, ProgressError> {
        self.reset_all(user_id, MarkKind::Difficult).await
    }

    async fn reset_all(&self, user_id: UserId, kind: MarkKind) -> Result<u64, ProgressError> {
        let mut conn = self.pool.acquire().await.map_err(RepositoryError::from)?;
        let removed = ProgressRepository::new(&mut conn)
            .delete_all_marks(user_id, kind)
            .await?;

        tracing::info!(%user_id, ?kind, removed, "All marks reset");
        Ok(removed)
    }

    /// Record that the user completed a category.
    ///
    /// Returns `true` only for the first completion; later calls keep the
    /// original `completed_at` and only refresh title and level.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::InvalidInput` if title or level are too long
    /// and `ProgressError::Repository` on storage failure.
    pub async fn complete_category(
        &self,
        user_id: UserId,
        category_id: CategoryId,
        category_title: Option<String>,
        level: Option<String>,
    ) -> Result<bool, ProgressError> {
        let category_title = optional_text(category_title, "category title", MAX_CATEGORY_TITLE_LENGTH)?;
        let level = optional_text(level, "level", MAX_LEVEL_LENGTH)?;

        let newly_completed = db::in_transaction(self.pool, move |conn| {
            Box::pin(async move {
                let mut repo = ProgressRepository::new(conn);
                let previous = repo.lock_completion(user_id, &category_id).await?;
                let write = repo
                    .upsert_completion(
                        user_id,
                        &category_id,
                        category_title.as_deref(),
                        level.as_deref(),
                    )
                    .await?;
                Ok::<_, ProgressError>(is_newly_completed(previous, write.inserted))
            })
        })
        .await?;

        tracing::info!(%user_id, newly_completed, "Category completion recorded");
        Ok(newly_completed)
    }
}

/// Deduplicate ids, keeping first occurrence order, and split them into
/// chunks of at most [`RESET_CHUNK_SIZE`].
fn chunk_card_ids(card_ids: Vec<CardId>) -> Vec<Vec<String>> {
    let mut seen = HashSet::new();
    let unique: Vec<String> = card_ids
        .into_iter()
        .map(CardId::into_inner)
        .filter(|id| seen.insert(id.clone()))
        .collect();

    unique
        .chunks(RESET_CHUNK_SIZE)
        .map(<[String]>::to_vec)
        .collect()
}

/// A completion is new if no row existed (and this write inserted it), or
/// the row existed without a completion timestamp.
const fn is_newly_completed(previous: Option<Option<DateTime<Utc>>>, inserted: bool) -> bool {
    match previous {
        Some(Some(_)) => false,
        Some(None) => true,
        None => inserted,
    }
}

/// Trim optional free text, treating blank as absent, and bound its length.
fn optional_text(
    value: Option<String>,
    field: &str,
    max: usize,
) -> Result<Option<String>, ProgressError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > max {
        return Err(ProgressError::InvalidInput(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(Some(trimmed.to_owned()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn cards(ids: &[&str]) -> Vec<CardId> {
        ids.iter().map(|id| CardId::parse(id).unwrap()).collect()
    }

    #[test]
    fn test_chunk_card_ids_deduplicates() {
        let chunks = chunk_card_ids(cards(&["c1", "c2", "c1", "c3"]));
        assert_eq!(chunks, vec![vec!["c1", "c2", "c3"]]);
    }

    #[test]
    fn test_chunk_card_ids_splits_large_batches() {
        let ids: Vec<CardId> = (0..1201)
            .map(|n| CardId::parse(&format!("card-{n}")).unwrap())
            .collect();
        let chunks = chunk_card_ids(ids);
        let sizes: Vec<usize> = chunks.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![500, 500, 201]);
        assert_eq!(chunks[2].last().unwrap(), "card-1200");
    }

    #[test]
    fn test_is_newly_completed() {
        let earlier = Utc::now();
        assert!(is_newly_completed(None, true));
        assert!(!is_newly_completed(None, false));
        assert!(is_newly_completed(Some(None), false));
        assert!(!is_newly_completed(Some(Some(earlier)), false));
    }

    #[test]
    fn test_optional_text() {
        assert_eq!(optional_text(None, "level", 10).unwrap(), None);
        assert_eq!(optional_text(Some("  ".to_owned()), "level", 10).unwrap(), None);
        assert_eq!(
            optional_text(Some(" A1 ".to_owned()), "level", 10).unwrap(),
            Some("A1".to_owned())
        );
        assert!(matches!(
            optional_text(Some("x".repeat(11)), "level", 10),
            Err(ProgressError::InvalidInput(_))
        ));
    }
}
