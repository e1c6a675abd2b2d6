use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    str::FromStr,
    sync::Arc,
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use async_openai::{types::CreateEmbeddingRequestArgs, Client};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, ModelTrait, TextEmbedding, TextInitOptions};
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::{
    error::AppError,
    utils::config::{AppConfig, EmbeddingBackendKind},
};

/// Seam the pipelines embed through, so tests can substitute failing or
/// canned backends.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError>;
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, AppError>;
    fn dimension(&self) -> usize;
}

#[async_trait]
impl Embedder for EmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError> {
        EmbeddingProvider::embed(self, text).await
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, AppError> {
        EmbeddingProvider::embed_batch(self, texts).await
    }

    fn dimension(&self) -> usize {
        EmbeddingProvider::dimension(self)
    }
}

/// Maps text to fixed-length vectors. Explicitly constructed once at startup
/// and shared; identical input yields an identical vector for a given
/// backend and model version.
#[derive(Clone)]
pub struct EmbeddingProvider {
    inner: EmbeddingInner,
    timeout: Duration,
}

#[derive(Clone)]
enum EmbeddingInner {
    OpenAI {
        client: Arc<Client<async_openai::config::OpenAIConfig>>,
        model: String,
        dimensions: u32,
    },
    FastEmbed {
        model: Arc<Mutex<TextEmbedding>>,
        model_name: EmbeddingModel,
        dimension: usize,
    },
    Hashed {
        dimension: usize,
    },
}

impl EmbeddingProvider {
    pub async fn from_config(
        config: &AppConfig,
        openai_client: Option<Arc<Client<async_openai::config::OpenAIConfig>>>,
    ) -> Result<Self, AppError> {
        let timeout = Duration::from_secs(config.embed_timeout_secs);
        match config.embedding_backend {
            EmbeddingBackendKind::OpenAI => {
                let client = openai_client.ok_or_else(|| {
                    AppError::InvalidConfiguration(
                        "openai embedding backend requires an OpenAI client".into(),
                    )
                })?;
                let model = config
                    .embedding_model
                    .clone()
                    .unwrap_or_else(|| "text-embedding-3-small".to_string());
                Ok(Self::new_openai(
                    client,
                    model,
                    config.embedding_dimensions,
                    timeout,
                ))
            }
            EmbeddingBackendKind::FastEmbed => {
                Self::new_fastembed(config.embedding_model.clone(), timeout)
                    .await
                    .map_err(|err| AppError::EmbeddingUnavailable(err.to_string()))
            }
            EmbeddingBackendKind::Hashed => {
                Ok(Self::new_hashed(config.embedding_dimensions as usize))
            }
        }
    }

    pub fn new_openai(
        client: Arc<Client<async_openai::config::OpenAIConfig>>,
        model: String,
        dimensions: u32,
        timeout: Duration,
    ) -> Self {
        EmbeddingProvider {
            inner: EmbeddingInner::OpenAI {
                client,
                model,
                dimensions,
            },
            timeout,
        }
    }

    pub async fn new_fastembed(model_override: Option<String>, timeout: Duration) -> Result<Self> {
        let model_name = if let Some(code) = model_override {
            EmbeddingModel::from_str(&code).map_err(|err| anyhow!(err))?
        } else {
            EmbeddingModel::default()
        };

        let options = TextInitOptions::new(model_name.clone()).with_show_download_progress(true);
        let model_name_for_task = model_name.clone();
        let model_name_code = model_name.to_string();

        let (model, dimension) = tokio::task::spawn_blocking(move || -> Result<_> {
            let model =
                TextEmbedding::try_new(options).context("initialising FastEmbed text model")?;
            let info = EmbeddingModel::get_model_info(&model_name_for_task)
                .ok_or_else(|| anyhow!("FastEmbed model metadata missing for {model_name_code}"))?;
            Ok((model, info.dim))
        })
        .await
        .context("joining FastEmbed initialisation task")??;

        Ok(EmbeddingProvider {
            inner: EmbeddingInner::FastEmbed {
                model: Arc::new(Mutex::new(model)),
                model_name,
                dimension,
            },
            timeout,
        })
    }

    pub fn new_hashed(dimension: usize) -> Self {
        EmbeddingProvider {
            inner: EmbeddingInner::Hashed {
                dimension: dimension.max(1),
            },
            timeout: Duration::from_secs(5),
        }
    }

    pub fn backend_label(&self) -> &'static str {
        match self.inner {
            EmbeddingInner::OpenAI { .. } => "openai",
            EmbeddingInner::FastEmbed { .. } => "fastembed",
            EmbeddingInner::Hashed { .. } => "hashed",
        }
    }

    pub fn dimension(&self) -> usize {
        match &self.inner {
            EmbeddingInner::OpenAI { dimensions, .. } => *dimensions as usize,
            EmbeddingInner::FastEmbed { dimension, .. } => *dimension,
            EmbeddingInner::Hashed { dimension } => *dimension,
        }
    }

    pub fn model_code(&self) -> Option<String> {
        match &self.inner {
            EmbeddingInner::OpenAI { model, .. } => Some(model.clone()),
            EmbeddingInner::FastEmbed { model_name, .. } => Some(model_name.to_string()),
            EmbeddingInner::Hashed { .. } => None,
        }
    }

    /// Embeds one text. Backend failures and timeouts surface as
    /// `EmbeddingUnavailable`, which aborts the enclosing ingestion or query.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError> {
        match timeout(self.timeout, self.embed_inner(text)).await {
            Ok(result) => result.map_err(|err| AppError::EmbeddingUnavailable(err.to_string())),
            Err(_) => Err(AppError::EmbeddingUnavailable(format!(
                "embedding call timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }

    /// Embeds many texts, preserving input order in the output.
    pub async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, AppError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        match timeout(self.timeout, self.embed_batch_inner(texts)).await {
            Ok(result) => result.map_err(|err| AppError::EmbeddingUnavailable(err.to_string())),
            Err(_) => Err(AppError::EmbeddingUnavailable(format!(
                "batch embedding call timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }

    async fn embed_inner(&self, text: &str) -> Result<Vec<f32>> {
        match &self.inner {
            EmbeddingInner::Hashed { dimension } => Ok(hashed_embedding(text, *dimension)),
            EmbeddingInner::FastEmbed { model, .. } => {
                let mut guard = model.lock().await;
                let embeddings = guard
                    .embed(vec![text.to_owned()], None)
                    .context("generating fastembed vector")?;
                embeddings
                    .into_iter()
                    .next()
                    .ok_or_else(|| anyhow!("fastembed returned no embedding for input"))
            }
            EmbeddingInner::OpenAI {
                client,
                model,
                dimensions,
            } => {
                let request = CreateEmbeddingRequestArgs::default()
                    .model(model.clone())
                    .input([text])
                    .dimensions(*dimensions)
                    .build()?;

                let response = client.embeddings().create(request).await?;

                response
                    .data
                    .into_iter()
                    .next()
                    .map(|item| item.embedding)
                    .ok_or_else(|| anyhow!("no embedding data received from API"))
            }
        }
    }

    async fn embed_batch_inner(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        match &self.inner {
            EmbeddingInner::Hashed { dimension } => Ok(texts
                .into_iter()
                .map(|text| hashed_embedding(&text, *dimension))
                .collect()),
            EmbeddingInner::FastEmbed { model, .. } => {
                let mut guard = model.lock().await;
                guard
                    .embed(texts, None)
                    .context("generating fastembed batch embeddings")
            }
            EmbeddingInner::OpenAI {
                client,
                model,
                dimensions,
            } => {
                let request = CreateEmbeddingRequestArgs::default()
                    .model(model.clone())
                    .input(texts)
                    .dimensions(*dimensions)
                    .build()?;

                let response = client.embeddings().create(request).await?;

                Ok(response
                    .data
                    .into_iter()
                    .map(|item| item.embedding)
                    .collect())
            }
        }
    }
}

// Deterministic bag-of-tokens embedding used by tests and offline setups.
fn hashed_embedding(text: &str, dimension: usize) -> Vec<f32> {
    let dim = dimension.max(1);
    let mut vector = vec![0.0f32; dim];
    if text.is_empty() {
        return vector;
    }

    for token in tokens(text) {
        let idx = bucket(&token, dim);
        if let Some(slot) = vector.get_mut(idx) {
            *slot += 1.0;
        }
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }

    vector
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_ascii_lowercase())
}

fn bucket(token: &str, dimension: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    token.hash(&mut hasher);
    (hasher.finish() as usize) % dimension
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hashed_embedding_is_deterministic() {
        let provider = EmbeddingProvider::new_hashed(64);
        let first = provider.embed("tokio uses cooperative scheduling").await;
        let second = provider.embed("tokio uses cooperative scheduling").await;
        assert_eq!(first.expect("embed"), second.expect("embed"));
    }

    #[tokio::test]
    async fn hashed_embedding_handles_single_word() {
        let provider = EmbeddingProvider::new_hashed(32);
        let vector = provider.embed("what").await.expect("embed");
        assert_eq!(vector.len(), 32);
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "expected unit norm, got {norm}");
    }

    #[tokio::test]
    async fn batch_preserves_input_order() {
        let provider = EmbeddingProvider::new_hashed(16);
        let batch = provider
            .embed_batch(vec!["alpha".into(), "beta".into(), "gamma".into()])
            .await
            .expect("batch embed");
        assert_eq!(batch.len(), 3);
        let alpha = provider.embed("alpha").await.expect("embed");
        let gamma = provider.embed("gamma").await.expect("embed");
        assert_eq!(batch[0], alpha);
        assert_eq!(batch[2], gamma);
    }

    #[tokio::test]
    async fn empty_batch_is_empty() {
        let provider = EmbeddingProvider::new_hashed(16);
        let batch = provider.embed_batch(Vec::new()).await.expect("batch");
        assert!(batch.is_empty());
    }

    #[test]
    fn dimension_reports_backend_dimension() {
        let provider = EmbeddingProvider::new_hashed(384);
        assert_eq!(provider.dimension(), 384);
        assert_eq!(provider.backend_label(), "hashed");
        assert!(provider.model_code().is_none());
    }
}
