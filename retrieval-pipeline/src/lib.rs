#![allow(clippy::missing_docs_in_private_items)]

pub mod answer;
pub mod rate_gate;

use std::sync::Arc;

use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        vector_index::{ScoredChunk, VectorIndex},
    },
    utils::{config::AppConfig, embedding::Embedder},
};
use tracing::{debug, instrument};

pub use answer::{Answer, AnswerSynthesizer, NO_DOCUMENTS_ANSWER};
pub use rate_gate::RateGate;

/// Ranked context for one question. An empty hit list is the designated
/// "no context" result: callers decide whether to short-circuit with a fixed
/// answer instead of invoking the model.
#[derive(Debug, Clone, Default)]
pub struct RetrievalResult {
    pub hits: Vec<ScoredChunk>,
}

impl RetrievalResult {
    pub fn no_context() -> Self {
        Self::default()
    }

    pub fn is_no_context(&self) -> bool {
        self.hits.is_empty()
    }
}

/// Embeds a question and ranks the asking user's chunks against it. Given an
/// unchanged index and a deterministic embedder, identical questions yield
/// identical ranked chunk sets.
pub struct RetrievalEngine {
    vector_index: VectorIndex,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
}

impl RetrievalEngine {
    pub fn new(db: Arc<SurrealDbClient>, embedder: Arc<dyn Embedder>, config: &AppConfig) -> Self {
        Self {
            vector_index: VectorIndex::new(db),
            embedder,
            top_k: config.max_context_chunks,
        }
    }

    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn retrieve(
        &self,
        user_id: &str,
        question: &str,
    ) -> Result<RetrievalResult, AppError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::EmptyQuestion);
        }

        let embedding = self.embedder.embed(question).await?;
        let hits = self
            .vector_index
            .query(user_id, &embedding, self.top_k)
            .await?;

        if hits.is_empty() {
            debug!("no indexed content for user");
            return Ok(RetrievalResult::no_context());
        }

        debug!(hits = hits.len(), "retrieved ranked context");
        Ok(RetrievalResult { hits })
    }
}
