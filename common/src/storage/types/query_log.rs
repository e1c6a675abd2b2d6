use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

stored_object!(QueryLog, "query_log", {
    user_id: String,
    question: String,
    answer: String,
    confidence: f32,
    sources: Vec<String>,
    retrieved_chunks: u32,
    duration_ms: u64
});

/// Aggregates over a user's logged questions.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct QueryStats {
    pub total_queries: u64,
    pub avg_confidence: f32,
    pub avg_duration_ms: f32,
}

impl QueryLog {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: String,
        question: String,
        answer: String,
        confidence: f32,
        sources: Vec<String>,
        retrieved_chunks: u32,
        duration_ms: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            user_id,
            question,
            answer,
            confidence,
            sources,
            retrieved_chunks,
            duration_ms,
        }
    }

    pub async fn recent_for_user(
        user_id: &str,
        limit: usize,
        db: &SurrealDbClient,
    ) -> Result<Vec<Self>, AppError> {
        let logs: Vec<Self> = db
            .client
            .query(
                "SELECT * FROM type::table($table_name) WHERE user_id = $user_id ORDER BY created_at DESC LIMIT $limit",
            )
            .bind(("table_name", Self::table_name()))
            .bind(("user_id", user_id.to_owned()))
            .bind(("limit", limit))
            .await?
            .take(0)?;

        Ok(logs)
    }

    pub async fn stats_for_user(
        user_id: &str,
        db: &SurrealDbClient,
    ) -> Result<QueryStats, AppError> {
        let stats: Option<QueryStats> = db
            .client
            .query(
                "SELECT count() AS total_queries, \
                 math::mean(confidence) AS avg_confidence, \
                 math::mean(duration_ms) AS avg_duration_ms \
                 FROM type::table($table_name) WHERE user_id = $user_id GROUP ALL",
            )
            .bind(("table_name", Self::table_name()))
            .bind(("user_id", user_id.to_owned()))
            .await?
            .take(0)?;

        Ok(stats.unwrap_or(QueryStats {
            total_queries: 0,
            avg_confidence: 0.0,
            avg_duration_ms: 0.0,
        }))
    }
}
