use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::error::AppError;

#[derive(Clone, Copy, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackendKind {
    OpenAI,
    FastEmbed,
    Hashed,
}

fn default_embedding_backend() -> EmbeddingBackendKind {
    EmbeddingBackendKind::FastEmbed
}

/// Formula used to derive the answer confidence from the similarities of the
/// chunks included in the prompt. Both are monotonic in retrieval quality
/// and bounded to [0, 1].
#[derive(Clone, Copy, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceFormula {
    Mean,
    Max,
}

fn default_confidence_formula() -> ConfidenceFormula {
    ConfidenceFormula::Mean
}

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    pub openai_api_key: String,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    pub surrealdb_address: String,
    pub surrealdb_username: String,
    pub surrealdb_password: String,
    pub surrealdb_namespace: String,
    pub surrealdb_database: String,
    pub http_port: u16,

    #[serde(default = "default_embedding_backend")]
    pub embedding_backend: EmbeddingBackendKind,
    /// Backend-specific model code; the backend default is used when unset.
    #[serde(default)]
    pub embedding_model: Option<String>,
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: u32,
    #[serde(default = "default_embed_timeout_secs")]
    pub embed_timeout_secs: u64,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_max_file_size_bytes")]
    pub max_file_size_bytes: u64,

    #[serde(default = "default_max_context_chunks")]
    pub max_context_chunks: usize,
    #[serde(default = "default_context_char_budget")]
    pub context_char_budget: usize,
    #[serde(default = "default_confidence_formula")]
    pub confidence_formula: ConfidenceFormula,

    #[serde(default = "default_query_model")]
    pub query_model: String,
    #[serde(default = "default_query_temperature")]
    pub query_temperature: f32,
    #[serde(default = "default_query_max_tokens")]
    pub query_max_tokens: u32,
    #[serde(default = "default_llm_calls_per_minute")]
    pub llm_calls_per_minute: usize,
    #[serde(default = "default_llm_retry_attempts")]
    pub llm_retry_attempts: usize,
    #[serde(default = "default_llm_timeout_secs")]
    pub llm_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_dimensions() -> u32 {
    384
}

fn default_embed_timeout_secs() -> u64 {
    30
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_max_file_size_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_max_context_chunks() -> usize {
    3
}

fn default_context_char_budget() -> usize {
    6000
}

fn default_query_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_query_temperature() -> f32 {
    0.1
}

fn default_query_max_tokens() -> u32 {
    1000
}

fn default_llm_calls_per_minute() -> usize {
    30
}

fn default_llm_retry_attempts() -> usize {
    3
}

fn default_llm_timeout_secs() -> u64 {
    60
}

impl AppConfig {
    /// Rejects parameter combinations the pipelines cannot honor.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.chunk_size == 0 {
            return Err(AppError::InvalidConfiguration(
                "chunk_size must be greater than zero".into(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::InvalidConfiguration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.llm_calls_per_minute == 0 {
            return Err(AppError::InvalidConfiguration(
                "llm_calls_per_minute must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}

#[cfg(any(test, feature = "test-utils"))]
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_api_key: "test-key".into(),
            openai_base_url: default_base_url(),
            surrealdb_address: "mem://".into(),
            surrealdb_username: "root".into(),
            surrealdb_password: "root".into(),
            surrealdb_namespace: "test_ns".into(),
            surrealdb_database: "test_db".into(),
            http_port: 0,
            embedding_backend: EmbeddingBackendKind::Hashed,
            embedding_model: None,
            embedding_dimensions: default_embedding_dimensions(),
            embed_timeout_secs: default_embed_timeout_secs(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            max_file_size_bytes: default_max_file_size_bytes(),
            max_context_chunks: default_max_context_chunks(),
            context_char_budget: default_context_char_budget(),
            confidence_formula: default_confidence_formula(),
            query_model: default_query_model(),
            query_temperature: default_query_temperature(),
            query_max_tokens: default_query_max_tokens(),
            llm_calls_per_minute: default_llm_calls_per_minute(),
            llm_retry_attempts: default_llm_retry_attempts(),
            llm_timeout_secs: default_llm_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_accepts_defaults() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_overlap_not_smaller_than_chunk_size() {
        let config = AppConfig {
            chunk_size: 100,
            chunk_overlap: 100,
            ..AppConfig::default()
        };
        let err = config.validate().expect_err("overlap == size must fail");
        assert_eq!(err.kind(), "invalid_configuration");

        let config = AppConfig {
            chunk_size: 100,
            chunk_overlap: 150,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_chunk_size() {
        let config = AppConfig {
            chunk_size: 0,
            chunk_overlap: 0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
