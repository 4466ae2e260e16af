//! Quiz result route handlers.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use kartica_core::QuizResultId;

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::quiz::QuizResultEntry;
use crate::services::quiz::{QuizLog, QuizSubmission};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResultRequest {
    pub quiz_id: String,
    pub category_title: String,
    pub level: String,
    pub correct: i32,
    pub incorrect: i32,
    pub total: i32,
}

impl From<SaveResultRequest> for QuizSubmission {
    fn from(body: SaveResultRequest) -> Self {
        Self {
            quiz_id: body.quiz_id,
            category_title: body.category_title,
            level: body.level,
            correct: body.correct,
            incorrect: body.incorrect,
            total: body.total,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResultResponse {
    pub message: &'static str,
    pub result_id: QuizResultId,
}

#[derive(Debug, Serialize)]
pub struct DeleteResultsResponse {
    pub message: &'static str,
    pub removed: u64,
}

#[instrument(skip_all)]
pub async fn save(
    State(state): State<AppState>,
    RequireAuth(user_id): RequireAuth,
    Json(body): Json<SaveResultRequest>,
) -> Result<(StatusCode, Json<SaveResultResponse>)> {
    let result_id = QuizLog::new(state.pool())
        .append(user_id, body.into())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SaveResultResponse {
            message: "Quiz result saved",
            result_id,
        }),
    ))
}

pub async fn list_all(
    State(state): State<AppState>,
    RequireAuth(user_id): RequireAuth,
) -> Result<Json<Vec<QuizResultEntry>>> {
    Ok(Json(QuizLog::new(state.pool()).list_all(user_id).await?))
}

#[instrument(skip_all)]
pub async fn delete_all(
    State(state): State<AppState>,
    RequireAuth(user_id): RequireAuth,
) -> Result<Json<DeleteResultsResponse>> {
    let removed = QuizLog::new(state.pool()).delete_all(user_id).await?;

    Ok(Json(DeleteResultsResponse {
        message: "All quiz results deleted",
        removed,
    }))
}
