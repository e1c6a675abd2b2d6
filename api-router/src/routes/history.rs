use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use common::storage::types::{query_log::QueryLog, user::User};
use serde::{Deserialize, Serialize};

use crate::{api_state::ApiState, error::ApiError};

const DEFAULT_HISTORY_LIMIT: usize = 10;
const MAX_HISTORY_LIMIT: usize = 100;

#[derive(Deserialize, Debug)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

#[derive(Serialize, Debug)]
pub struct HistoryEntry {
    pub question: String,
    pub answer: String,
    pub confidence: f32,
    pub sources: Vec<String>,
    pub asked_at: DateTime<Utc>,
}

pub async fn get_history(
    State(state): State<ApiState>,
    Extension(user): Extension<User>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);

    let logs = QueryLog::recent_for_user(&user.id, limit, &state.db).await?;

    Ok(Json(
        logs.into_iter()
            .map(|log| HistoryEntry {
                question: log.question,
                answer: log.answer,
                confidence: log.confidence,
                sources: log.sources,
                asked_at: log.created_at,
            })
            .collect(),
    ))
}
