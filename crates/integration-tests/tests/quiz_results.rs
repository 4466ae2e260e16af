//! Integration tests for the quiz result log.
//!
//! Requires a `PostgreSQL` database at `TEST_DATABASE_URL`.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use kartica_integration_tests::{register_user_id, test_pool};
use kartica_server::services::quiz::{QuizError, QuizLog, QuizSubmission};

fn submission(quiz_id: &str, correct: i32, incorrect: i32, total: i32) -> QuizSubmission {
    QuizSubmission {
        quiz_id: quiz_id.to_owned(),
        category_title: "Colors".to_owned(),
        level: "A1".to_owned(),
        correct,
        incorrect,
        total,
    }
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_counts_over_total_are_rejected_and_not_stored() {
    let pool = test_pool().await;
    let user_id = register_user_id(&pool).await;
    let log = QuizLog::new(&pool);

    let result = log.append(user_id, submission("q1", 3, 2, 4)).await;

    assert!(matches!(result, Err(QuizError::InvariantViolation(_))));
    assert!(log.list_all(user_id).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_saved_result_reports_accuracy() {
    let pool = test_pool().await;
    let user_id = register_user_id(&pool).await;
    let log = QuizLog::new(&pool);

    let id = log.append(user_id, submission("q1", 3, 1, 4)).await.unwrap();
    let entries = log.list_all(user_id).await.unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].result.id, id);
    assert_eq!(entries[0].result.quiz_id.as_str(), "q1");
    assert_eq!(entries[0].result.correct_count, 3);
    assert_eq!(entries[0].result.incorrect_count, 1);
    assert_eq!(entries[0].result.total_questions, 4);
    assert_eq!(entries[0].accuracy, 75);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_results_are_listed_newest_first() {
    let pool = test_pool().await;
    let user_id = register_user_id(&pool).await;
    let log = QuizLog::new(&pool);

    let first = log.append(user_id, submission("q1", 1, 0, 1)).await.unwrap();
    let second = log.append(user_id, submission("q2", 0, 1, 1)).await.unwrap();

    let ids: Vec<_> = log
        .list_all(user_id)
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.result.id)
        .collect();

    assert_eq!(ids, [second, first]);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_delete_all_removes_only_own_results() {
    let pool = test_pool().await;
    let ana = register_user_id(&pool).await;
    let ivo = register_user_id(&pool).await;
    let log = QuizLog::new(&pool);

    log.append(ana, submission("q1", 2, 2, 4)).await.unwrap();
    log.append(ana, submission("q2", 4, 0, 4)).await.unwrap();
    log.append(ivo, submission("q1", 1, 3, 4)).await.unwrap();

    assert_eq!(log.delete_all(ana).await.unwrap(), 2);
    assert!(log.list_all(ana).await.unwrap().is_empty());
    assert_eq!(log.list_all(ivo).await.unwrap().len(), 1);
}
