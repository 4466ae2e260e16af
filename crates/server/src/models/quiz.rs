//! Quiz result types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use kartica_core::{QuizKey, QuizResultId};

/// A validated quiz attempt ready to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQuizResult {
    pub quiz_id: QuizKey,
    pub category_title: String,
    pub level: String,
    pub correct: i32,
    pub incorrect: i32,
    pub total: i32,
}

/// A stored quiz attempt. Never mutated after insert.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    pub id: QuizResultId,
    pub quiz_id: QuizKey,
    pub category_title: String,
    pub level: String,
    pub correct_count: i32,
    pub incorrect_count: i32,
    pub total_questions: i32,
    pub completed_at: DateTime<Utc>,
}

/// A stored attempt together with its derived accuracy percentage.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuizResultEntry {
    #[serde(flatten)]
    pub result: QuizResult,
    pub accuracy: i32,
}
