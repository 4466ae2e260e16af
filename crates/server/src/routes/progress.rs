//! Progress route handlers. Every route requires a bearer token.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use kartica_core::{CardId, CategoryId};

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::progress::CategoryCompletion;
use crate::services::progress::{ProgressError, ProgressLedger};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleLearnedRequest {
    pub card_id: String,
    pub learned: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleDifficultRequest {
    pub card_id: String,
    pub difficult: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlearnManyRequest {
    pub card_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteCategoryRequest {
    pub category_id: String,
    pub category_title: Option<String>,
    pub level: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub message: &'static str,
    pub changed: bool,
}

#[derive(Debug, Serialize)]
pub struct RemovedResponse {
    pub message: &'static str,
    pub removed: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteCategoryResponse {
    pub newly_completed: bool,
}

/// Card ids marked learned.
pub async fn learned(
    State(state): State<AppState>,
    RequireAuth(user_id): RequireAuth,
) -> Result<Json<Vec<CardId>>> {
    Ok(Json(
        ProgressLedger::new(state.pool())
            .learned_cards(user_id)
            .await?,
    ))
}

/// Card ids marked difficult.
pub async fn difficult(
    State(state): State<AppState>,
    RequireAuth(user_id): RequireAuth,
) -> Result<Json<Vec<CardId>>> {
    Ok(Json(
        ProgressLedger::new(state.pool())
            .difficult_cards(user_id)
            .await?,
    ))
}

/// Completed categories.
pub async fn categories(
    State(state): State<AppState>,
    RequireAuth(user_id): RequireAuth,
) -> Result<Json<Vec<CategoryCompletion>>> {
    Ok(Json(
        ProgressLedger::new(state.pool())
            .completed_categories(user_id)
            .await?,
    ))
}

#[instrument(skip_all)]
pub async fn toggle_learned(
    State(state): State<AppState>,
    RequireAuth(user_id): RequireAuth,
    Json(body): Json<ToggleLearnedRequest>,
) -> Result<Json<ToggleResponse>> {
    let card_id = CardId::parse(&body.card_id).map_err(ProgressError::from)?;
    let changed = ProgressLedger::new(state.pool())
        .set_learned(user_id, &card_id, body.learned)
        .await?;

    Ok(Json(ToggleResponse {
        message: if body.learned {
            "Card marked as learned"
        } else {
            "Card marked as not learned"
        },
        changed,
    }))
}

#[instrument(skip_all)]
pub async fn toggle_difficult(
    State(state): State<AppState>,
    RequireAuth(user_id): RequireAuth,
    Json(body): Json<ToggleDifficultRequest>,
) -> Result<Json<ToggleResponse>> {
    let card_id = CardId::parse(&body.card_id).map_err(ProgressError::from)?;
    let changed = ProgressLedger::new(state.pool())
        .set_difficult(user_id, &card_id, body.difficult)
        .await?;

    Ok(Json(ToggleResponse {
        message: if body.difficult {
            "Card marked as difficult"
        } else {
            "Card marked as not difficult"
        },
        changed,
    }))
}

#[instrument(skip_all)]
pub async fn reset_all_learned(
    State(state): State<AppState>,
    RequireAuth(user_id): RequireAuth,
) -> Result<Json<RemovedResponse>> {
    let removed = ProgressLedger::new(state.pool())
        .reset_all_learned(user_id)
        .await?;

    Ok(Json(RemovedResponse {
        message: "All learned progress reset",
        removed,
    }))
}

#[instrument(skip_all)]
pub async fn reset_all_difficult(
    State(state): State<AppState>,
    RequireAuth(user_id): RequireAuth,
) -> Result<Json<RemovedResponse>> {
    let removed = ProgressLedger::new(state.pool())
        .reset_all_difficult(user_id)
        .await?;

    Ok(Json(RemovedResponse {
        message: "All difficult marks reset",
        removed,
    }))
}

#[instrument(skip_all)]
pub async fn unlearn_many(
    State(state): State<AppState>,
    RequireAuth(user_id): RequireAuth,
    Json(body): Json<UnlearnManyRequest>,
) -> Result<Json<RemovedResponse>> {
    let card_ids = body
        .card_ids
        .iter()
        .map(|id| CardId::parse(id))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(ProgressError::from)?;

    let removed = ProgressLedger::new(state.pool())
        .reset_learned(user_id, card_ids)
        .await?;

    Ok(Json(RemovedResponse {
        message: "Cards marked as not learned",
        removed,
    }))
}

#[instrument(skip_all)]
pub async fn complete_category(
    State(state): State<AppState>,
    RequireAuth(user_id): RequireAuth,
    Json(body): Json<CompleteCategoryRequest>,
) -> Result<Json<CompleteCategoryResponse>> {
    let category_id = CategoryId::parse(&body.category_id).map_err(ProgressError::from)?;
    let newly_completed = ProgressLedger::new(state.pool())
        .complete_category(user_id, category_id, body.category_title, body.level)
        .await?;

    Ok(Json(CompleteCategoryResponse { newly_completed }))
}
