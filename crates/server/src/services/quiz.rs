//! Quiz result log.

use sqlx::PgPool;
use thiserror::Error;

use kartica_core::{KeyError, QuizKey, QuizResultId, UserId};

use crate::db::{QuizResultRepository, RepositoryError};
use crate::models::quiz::{NewQuizResult, QuizResultEntry};

const MAX_CATEGORY_TITLE_LENGTH: usize = 255;
const MAX_LEVEL_LENGTH: usize = 10;

/// Errors from quiz log operations.
#[derive(Debug, Error)]
pub enum QuizError {
    /// Counts are negative or `correct + incorrect` exceeds `total`.
    #[error("{0}")]
    InvariantViolation(String),

    /// Malformed quiz id.
    #[error("{0}")]
    InvalidKey(#[from] KeyError),

    /// Other malformed input.
    #[error("{0}")]
    InvalidInput(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Unvalidated quiz attempt as submitted by a client.
#[derive(Debug, Clone)]
pub struct QuizSubmission {
    pub quiz_id: String,
    pub category_title: String,
    pub level: String,
    pub correct: i32,
    pub incorrect: i32,
    pub total: i32,
}

impl QuizSubmission {
    /// Validate into a [`NewQuizResult`].
    ///
    /// # Errors
    ///
    /// Returns `QuizError::InvariantViolation` for inconsistent counts,
    /// `QuizError::InvalidKey` or `QuizError::InvalidInput` for bad text fields.
    pub fn validate(self) -> Result<NewQuizResult, QuizError> {
        check_counts(self.correct, self.incorrect, self.total)?;

        let quiz_id = QuizKey::parse(&self.quiz_id)?;
        let category_title = required_text(&self.category_title, "category title", MAX_CATEGORY_TITLE_LENGTH)?;
        let level = required_text(&self.level, "level", MAX_LEVEL_LENGTH)?;

        Ok(NewQuizResult {
            quiz_id,
            category_title,
            level,
            correct: self.correct,
            incorrect: self.incorrect,
            total: self.total,
        })
    }
}

fn check_counts(correct: i32, incorrect: i32, total: i32) -> Result<(), QuizError> {
    if correct < 0 || incorrect < 0 || total < 0 {
        return Err(QuizError::InvariantViolation(
            "counts must not be negative".to_owned(),
        ));
    }
    // i64 so the sum cannot overflow.
    if i64::from(correct) + i64::from(incorrect) > i64::from(total) {
        return Err(QuizError::InvariantViolation(
            "correct + incorrect must not exceed total".to_owned(),
        ));
    }
    Ok(())
}

fn required_text(value: &str, field: &str, max: usize) -> Result<String, QuizError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(QuizError::InvalidInput(format!("{field} is required")));
    }
    if trimmed.chars().count() > max {
        return Err(QuizError::InvalidInput(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(trimmed.to_owned())
}

/// Accuracy as a whole percentage, `round(correct / total * 100)`.
///
/// Halves round up. Zero when `total` is zero.
#[must_use]
pub fn accuracy(correct: i32, total: i32) -> i32 {
    if total <= 0 {
        return 0;
    }
    let (correct, total) = (i64::from(correct.max(0)), i64::from(total));
    let rounded = (correct * 200 + total) / (2 * total);
    i32::try_from(rounded).unwrap_or(i32::MAX)
}

/// Quiz result log service.
pub struct QuizLog<'a> {
    pool: &'a PgPool,
}

impl<'a> QuizLog<'a> {
    /// Create a new quiz log.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Append a quiz attempt.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::InvariantViolation` for inconsistent counts (also
    /// when the database CHECK constraint rejects them), and
    /// `QuizError::Repository` on storage failure.
    pub async fn append(
        &self,
        user_id: UserId,
        submission: QuizSubmission,
    ) -> Result<QuizResultId, QuizError> {
        let result = submission.validate()?;

        let mut conn = self.pool.acquire().await.map_err(RepositoryError::from)?;
        let id = QuizResultRepository::new(&mut conn)
            .insert(user_id, &result)
            .await
            .map_err(|e| match e {
                RepositoryError::ConstraintViolation(constraint) => {
                    QuizError::InvariantViolation(format!("rejected by {constraint}"))
                }
                other => QuizError::Repository(other),
            })?;

        tracing::info!(%user_id, result_id = %id, quiz_id = %result.quiz_id, "Quiz result saved");
        Ok(id)
    }

    /// All attempts of a user, newest first, with accuracy.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Repository` on storage failure.
    pub async fn list_all(&self, user_id: UserId) -> Result<Vec<QuizResultEntry>, QuizError> {
        let mut conn = self.pool.acquire().await.map_err(RepositoryError::from)?;
        let results = QuizResultRepository::new(&mut conn)
            .list_for_user(user_id)
            .await?;

        Ok(results
            .into_iter()
            .map(|result| QuizResultEntry {
                accuracy: accuracy(result.correct_count, result.total_questions),
                result,
            })
            .collect())
    }

    /// Delete all attempts of a user. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Repository` on storage failure.
    pub async fn delete_all(&self, user_id: UserId) -> Result<u64, QuizError> {
        let mut conn = self.pool.acquire().await.map_err(RepositoryError::from)?;
        let removed = QuizResultRepository::new(&mut conn)
            .delete_all_for_user(user_id)
            .await?;

        tracing::info!(%user_id, removed, "Quiz results deleted");
        Ok(removed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn submission(correct: i32, incorrect: i32, total: i32) -> QuizSubmission {
        QuizSubmission {
            quiz_id: "q-a1-greetings".to_owned(),
            category_title: "Greetings".to_owned(),
            level: "A1".to_owned(),
            correct,
            incorrect,
            total,
        }
    }

    #[test]
    fn test_counts_exceeding_total_are_rejected() {
        assert!(matches!(
            submission(3, 2, 4).validate(),
            Err(QuizError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_negative_counts_are_rejected() {
        assert!(matches!(
            submission(-1, 0, 4).validate(),
            Err(QuizError::InvariantViolation(_))
        ));
        assert!(matches!(
            submission(0, 0, -1).validate(),
            Err(QuizError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_valid_submission() {
        let result = submission(3, 1, 4).validate().unwrap();
        assert_eq!(result.quiz_id.as_str(), "q-a1-greetings");
        assert_eq!(result.correct + result.incorrect, 4);

        // Unanswered questions are allowed.
        assert!(submission(1, 1, 5).validate().is_ok());
        assert!(submission(0, 0, 0).validate().is_ok());
    }

    #[test]
    fn test_text_fields_are_required() {
        let mut missing_title = submission(1, 0, 1);
        missing_title.category_title = "   ".to_owned();
        assert!(matches!(
            missing_title.validate(),
            Err(QuizError::InvalidInput(_))
        ));

        let mut long_level = submission(1, 0, 1);
        long_level.level = "x".repeat(11);
        assert!(matches!(long_level.validate(), Err(QuizError::InvalidInput(_))));

        let mut blank_id = submission(1, 0, 1);
        blank_id.quiz_id = String::new();
        assert!(matches!(blank_id.validate(), Err(QuizError::InvalidKey(_))));
    }

    #[test]
    fn test_accuracy() {
        assert_eq!(accuracy(3, 4), 75);
        assert_eq!(accuracy(0, 0), 0);
        assert_eq!(accuracy(4, 4), 100);
        assert_eq!(accuracy(1, 3), 33);
        assert_eq!(accuracy(2, 3), 67);
        assert_eq!(accuracy(1, 8), 13);
    }
}
