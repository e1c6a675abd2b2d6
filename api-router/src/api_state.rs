use std::sync::Arc;

use async_openai::Client;
use common::{
    error::AppError, storage::db::SurrealDbClient, utils::config::AppConfig,
    utils::embedding::Embedder,
};
use ingestion_pipeline::{ConsistencyManager, DocumentLocks, IngestionPipeline};
use retrieval_pipeline::{AnswerSynthesizer, RateGate, RetrievalEngine};

/// Explicitly constructed service objects, shared by every route. Built once
/// at startup and injected rather than reached for as globals.
#[derive(Clone)]
pub struct ApiState {
    pub db: Arc<SurrealDbClient>,
    pub config: AppConfig,
    pub ingestion: Arc<IngestionPipeline>,
    pub retrieval: Arc<RetrievalEngine>,
    pub synthesizer: Arc<AnswerSynthesizer>,
    pub consistency: Arc<ConsistencyManager>,
}

impl ApiState {
    pub fn new(
        db: Arc<SurrealDbClient>,
        openai_client: Arc<Client<async_openai::config::OpenAIConfig>>,
        embedder: Arc<dyn Embedder>,
        config: AppConfig,
    ) -> Result<Self, AppError> {
        config.validate()?;

        let locks = Arc::new(DocumentLocks::new());
        let rate_gate = Arc::new(RateGate::new(config.llm_calls_per_minute));

        let ingestion = Arc::new(IngestionPipeline::new(
            Arc::clone(&db),
            Arc::clone(&embedder),
            Arc::clone(&locks),
            &config,
        )?);
        let retrieval = Arc::new(RetrievalEngine::new(
            Arc::clone(&db),
            Arc::clone(&embedder),
            &config,
        ));
        let synthesizer = Arc::new(AnswerSynthesizer::new(
            Arc::clone(&db),
            openai_client,
            rate_gate,
            &config,
        ));
        let consistency = Arc::new(ConsistencyManager::new(Arc::clone(&db), locks));

        Ok(Self {
            db,
            config,
            ingestion,
            retrieval,
            synthesizer,
            consistency,
        })
    }
}
