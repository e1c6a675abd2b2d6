use axum::{extract::State, Extension, Json};
use common::storage::types::{
    document::Document,
    query_log::{QueryLog, QueryStats},
    user::User,
};
use serde::Serialize;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Serialize, Debug)]
pub struct DocumentStats {
    pub total_documents: u64,
}

#[derive(Serialize, Debug)]
pub struct StatsResponse {
    pub documents: DocumentStats,
    pub queries: QueryStats,
}

pub async fn get_stats(
    State(state): State<ApiState>,
    Extension(user): Extension<User>,
) -> Result<Json<StatsResponse>, ApiError> {
    let total_documents = Document::count_for_user(&user.id, &state.db).await?;
    let queries = QueryLog::stats_for_user(&user.id, &state.db).await?;

    Ok(Json(StatsResponse {
        documents: DocumentStats { total_documents },
        queries,
    }))
}
