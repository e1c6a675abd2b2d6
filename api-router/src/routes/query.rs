use std::time::Instant;

use axum::{extract::State, Extension, Json};
use common::storage::types::{query_log::QueryLog, user::User};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Deserialize, Debug)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Serialize, Debug)]
pub struct AskResponse {
    pub question: String,
    pub answer: String,
    pub sources: Vec<String>,
    pub confidence: f32,
    pub retrieved_chunks: u32,
    pub duration_ms: u64,
}

pub async fn ask_question(
    State(state): State<ApiState>,
    Extension(user): Extension<User>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    let started = Instant::now();
    let question = request.question.trim().to_string();

    let retrieval = state.retrieval.retrieve(&user.id, &question).await?;
    let answer = state.synthesizer.synthesize(&question, &retrieval).await?;

    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let log = QueryLog::new(
        user.id.clone(),
        question.clone(),
        answer.answer.clone(),
        answer.confidence,
        answer.sources.clone(),
        answer.context_chunks,
        duration_ms,
    );
    // The answer is already produced; a failed audit write must not fail it.
    if let Err(err) = state.db.store_item(log).await {
        warn!(user_id = %user.id, error = %err, "failed to record query log");
    }

    Ok(Json(AskResponse {
        question,
        answer: answer.answer,
        sources: answer.sources,
        confidence: answer.confidence,
        retrieved_chunks: answer.context_chunks,
        duration_ms,
    }))
}
