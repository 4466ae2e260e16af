//! Integration tests for the progress ledger.
//!
//! Requires a `PostgreSQL` database at `TEST_DATABASE_URL`.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use kartica_core::{CardId, CategoryId};
use kartica_integration_tests::{register_user_id, test_pool, unique_name};
use kartica_server::services::auth::AuthService;
use kartica_server::services::progress::{ProgressError, ProgressLedger};

fn card(id: &str) -> CardId {
    CardId::parse(id).expect("valid card id")
}

fn sorted_ids(cards: &[CardId]) -> Vec<&str> {
    let mut ids: Vec<&str> = cards.iter().map(CardId::as_str).collect();
    ids.sort_unstable();
    ids
}

// =============================================================================
// Learned / Difficult Marks
// =============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_set_learned_is_idempotent() {
    let pool = test_pool().await;
    let user_id = register_user_id(&pool).await;
    let ledger = ProgressLedger::new(&pool);

    assert!(ledger.set_learned(user_id, &card("c1"), true).await.unwrap());
    assert!(!ledger.set_learned(user_id, &card("c1"), true).await.unwrap());
    assert_eq!(sorted_ids(&ledger.learned_cards(user_id).await.unwrap()), ["c1"]);

    assert!(ledger.set_learned(user_id, &card("c1"), false).await.unwrap());
    assert!(!ledger.set_learned(user_id, &card("c1"), false).await.unwrap());
    assert!(ledger.learned_cards(user_id).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_difficult_marks_are_independent_of_learned() {
    let pool = test_pool().await;
    let user_id = register_user_id(&pool).await;
    let ledger = ProgressLedger::new(&pool);

    ledger.set_learned(user_id, &card("c1"), true).await.unwrap();
    ledger.set_difficult(user_id, &card("c1"), true).await.unwrap();
    ledger.set_difficult(user_id, &card("c2"), true).await.unwrap();

    assert_eq!(ledger.reset_all_learned(user_id).await.unwrap(), 1);
    assert_eq!(
        sorted_ids(&ledger.difficult_cards(user_id).await.unwrap()),
        ["c1", "c2"]
    );

    assert_eq!(ledger.reset_all_difficult(user_id).await.unwrap(), 2);
    assert!(ledger.difficult_cards(user_id).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_reset_learned_removes_only_listed_cards() {
    let pool = test_pool().await;
    let user_id = register_user_id(&pool).await;
    let ledger = ProgressLedger::new(&pool);

    for id in ["c1", "c2", "c3"] {
        ledger.set_learned(user_id, &card(id), true).await.unwrap();
    }

    let removed = ledger
        .reset_learned(user_id, vec![card("c1"), card("c2"), card("c9")])
        .await
        .unwrap();

    assert_eq!(removed, 2);
    assert_eq!(sorted_ids(&ledger.learned_cards(user_id).await.unwrap()), ["c3"]);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_reset_learned_rejects_empty_list() {
    let pool = test_pool().await;
    let user_id = register_user_id(&pool).await;

    let result = ProgressLedger::new(&pool)
        .reset_learned(user_id, Vec::new())
        .await;

    assert!(matches!(result, Err(ProgressError::InvalidInput(_))));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_marks_are_scoped_per_user() {
    let pool = test_pool().await;
    let ana = register_user_id(&pool).await;
    let ivo = register_user_id(&pool).await;
    let ledger = ProgressLedger::new(&pool);

    ledger.set_learned(ana, &card("c1"), true).await.unwrap();

    assert!(ledger.learned_cards(ivo).await.unwrap().is_empty());
    assert_eq!(ledger.reset_all_learned(ivo).await.unwrap(), 0);
    assert_eq!(sorted_ids(&ledger.learned_cards(ana).await.unwrap()), ["c1"]);
}

// =============================================================================
// Category Completion
// =============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_first_completion_wins() {
    let pool = test_pool().await;
    let user_id = register_user_id(&pool).await;
    let ledger = ProgressLedger::new(&pool);
    let category = CategoryId::parse("colors").expect("valid category id");

    let first = ledger
        .complete_category(
            user_id,
            category.clone(),
            Some("Colors".to_owned()),
            Some("A1".to_owned()),
        )
        .await
        .unwrap();
    assert!(first);

    let before = ledger.completed_categories(user_id).await.unwrap();

    let second = ledger
        .complete_category(user_id, category.clone(), None, None)
        .await
        .unwrap();
    assert!(!second);

    let after = ledger.completed_categories(user_id).await.unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].category_id, category);
    assert_eq!(after[0].completed_at, before[0].completed_at);
    assert_eq!(after[0].category_title.as_deref(), Some("Colors"));
    assert_eq!(after[0].level.as_deref(), Some("A1"));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_concurrent_completions_report_one_first_completion() {
    let pool = test_pool().await;
    let user_id = register_user_id(&pool).await;
    let ledger = ProgressLedger::new(&pool);
    let category = CategoryId::parse("animals").expect("valid category id");

    let (a, b) = tokio::join!(
        ledger.complete_category(user_id, category.clone(), Some("Animals".to_owned()), None),
        ledger.complete_category(user_id, category.clone(), Some("Animals".to_owned()), None),
    );

    let firsts = [a.unwrap(), b.unwrap()].into_iter().filter(|&first| first).count();
    assert_eq!(firsts, 1);
    assert_eq!(ledger.completed_categories(user_id).await.unwrap().len(), 1);
}

// =============================================================================
// End to End
// =============================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_register_login_learn_then_reset_some() {
    let pool = test_pool().await;
    let username = format!("ana{}", unique_name());
    let email = format!("{username}@x.com");
    let auth = AuthService::new(&pool);

    let registered = auth.register(&username, &email, "secret1").await.unwrap();
    let logged_in = auth.login(&email, "secret1").await.unwrap();
    assert_eq!(logged_in.id, registered.id);

    let ledger = ProgressLedger::new(&pool);
    for id in ["c1", "c2", "c3"] {
        assert!(ledger.set_learned(logged_in.id, &card(id), true).await.unwrap());
    }
    assert_eq!(
        sorted_ids(&ledger.learned_cards(logged_in.id).await.unwrap()),
        ["c1", "c2", "c3"]
    );

    let removed = ledger
        .reset_learned(logged_in.id, vec![card("c1"), card("c2")])
        .await
        .unwrap();

    assert_eq!(removed, 2);
    assert_eq!(sorted_ids(&ledger.learned_cards(logged_in.id).await.unwrap()), ["c3"]);
}
