use std::{sync::Arc, time::Duration};

use async_openai::{
    error::OpenAIError,
    types::{
        ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse,
    },
    Client,
};
use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient, types::system_settings::SystemSettings, vector_index::ScoredChunk,
    },
    utils::config::{AppConfig, ConfidenceFormula},
};
use tokio::time::timeout;
use tokio_retry::{
    strategy::{jitter, ExponentialBackoff},
    RetryIf,
};
use tracing::{debug, instrument, warn};

use crate::{rate_gate::RateGate, RetrievalResult};

/// Fixed answer returned without a model call when retrieval found nothing.
pub const NO_DOCUMENTS_ANSWER: &str = "I couldn't find any relevant information to answer your \
question. Please make sure you have uploaded a relevant document first.";

const RETRY_BASE_DELAY_MS: u64 = 500;
const RETRY_MAX_DELAY: Duration = Duration::from_secs(10);

/// A grounded answer with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub answer: String,
    /// Distinct ids of the documents whose chunks made it into the prompt,
    /// in order of first appearance.
    pub sources: Vec<String>,
    pub confidence: f32,
    pub context_chunks: u32,
}

/// Builds a grounded prompt from retrieved context, invokes the chat model
/// under the rate ceiling, and post-processes the response. Retry/backoff
/// policy lives here so it is testable independently of prompt content.
pub struct AnswerSynthesizer {
    db: Arc<SurrealDbClient>,
    openai_client: Arc<Client<async_openai::config::OpenAIConfig>>,
    rate_gate: Arc<RateGate>,
    context_char_budget: usize,
    confidence_formula: ConfidenceFormula,
    retry_attempts: usize,
    llm_timeout: Duration,
}

impl AnswerSynthesizer {
    pub fn new(
        db: Arc<SurrealDbClient>,
        openai_client: Arc<Client<async_openai::config::OpenAIConfig>>,
        rate_gate: Arc<RateGate>,
        config: &AppConfig,
    ) -> Self {
        Self {
            db,
            openai_client,
            rate_gate,
            context_char_budget: config.context_char_budget,
            confidence_formula: config.confidence_formula,
            retry_attempts: config.llm_retry_attempts,
            llm_timeout: Duration::from_secs(config.llm_timeout_secs),
        }
    }

    #[instrument(skip_all)]
    pub async fn synthesize(
        &self,
        question: &str,
        retrieval: &RetrievalResult,
    ) -> Result<Answer, AppError> {
        if retrieval.is_no_context() {
            debug!("no context retrieved; returning fixed answer without a model call");
            return Ok(Answer {
                answer: NO_DOCUMENTS_ANSWER.to_string(),
                sources: Vec::new(),
                confidence: 0.0,
                context_chunks: 0,
            });
        }

        let included = select_context(&retrieval.hits, self.context_char_budget);
        let settings = SystemSettings::get_current(&self.db).await?;
        let request = build_chat_request(question, &included, &settings)?;

        let response = self.invoke_with_retry(request).await?;

        let answer = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_ref())
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| {
                AppError::AnswerGenerationFailed("LLM response contained no content".into())
            })?;

        Ok(Answer {
            answer,
            sources: distinct_sources(&included),
            confidence: derive_confidence(&included, self.confidence_formula),
            context_chunks: included.len() as u32,
        })
    }

    async fn invoke_with_retry(
        &self,
        request: CreateChatCompletionRequest,
    ) -> Result<CreateChatCompletionResponse, AppError> {
        let retry_strategy = ExponentialBackoff::from_millis(RETRY_BASE_DELAY_MS)
            .max_delay(RETRY_MAX_DELAY)
            .map(jitter)
            .take(self.retry_attempts);

        RetryIf::spawn(
            retry_strategy,
            || self.attempt(request.clone()),
            |err: &LlmAttemptError| {
                let retry = err.is_retryable();
                if retry {
                    warn!(error = %err.detail_ref(), "retryable LLM failure; backing off");
                }
                retry
            },
        )
        .await
        .map_err(|err| AppError::AnswerGenerationFailed(err.into_detail()))
    }

    async fn attempt(
        &self,
        request: CreateChatCompletionRequest,
    ) -> Result<CreateChatCompletionResponse, LlmAttemptError> {
        if let Err(retry_after) = self.rate_gate.try_acquire().await {
            return Err(LlmAttemptError::Retryable(format!(
                "call ceiling reached; a permit frees in {}ms",
                retry_after.as_millis()
            )));
        }

        match timeout(self.llm_timeout, self.openai_client.chat().create(request)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(err)) => Err(classify_openai_error(err)),
            Err(_) => Err(LlmAttemptError::Retryable(format!(
                "LLM call timed out after {}s",
                self.llm_timeout.as_secs()
            ))),
        }
    }
}

#[derive(Debug)]
enum LlmAttemptError {
    Retryable(String),
    Fatal(String),
}

impl LlmAttemptError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }

    fn detail_ref(&self) -> &str {
        match self {
            Self::Retryable(detail) | Self::Fatal(detail) => detail,
        }
    }

    fn into_detail(self) -> String {
        match self {
            Self::Retryable(detail) => format!("retries exhausted: {detail}"),
            Self::Fatal(detail) => detail,
        }
    }
}

/// Rate limits and timeouts are worth retrying; auth, quota and malformed
/// request failures are not.
fn classify_openai_error(err: OpenAIError) -> LlmAttemptError {
    match &err {
        OpenAIError::ApiError(api) => {
            if retryable_api_signals(api.r#type.as_deref(), &api.message) {
                LlmAttemptError::Retryable(err.to_string())
            } else {
                LlmAttemptError::Fatal(err.to_string())
            }
        }
        OpenAIError::InvalidArgument(_) => LlmAttemptError::Fatal(err.to_string()),
        // Transport-level failures (connection reset, timeout) are
        // plausibly transient.
        _ => LlmAttemptError::Retryable(err.to_string()),
    }
}

fn retryable_api_signals(error_type: Option<&str>, message: &str) -> bool {
    let type_label = error_type.unwrap_or_default().to_ascii_lowercase();
    if type_label.contains("rate_limit") || type_label.contains("overloaded") {
        return true;
    }
    if type_label.contains("insufficient_quota") || type_label.contains("authentication") {
        return false;
    }

    let message = message.to_ascii_lowercase();
    message.contains("rate limit") || message.contains("429") || message.contains("overloaded")
}

/// Walks hits in ranked order, keeping whole chunks until the character
/// budget would be exceeded. The top hit is always kept so a single
/// oversized chunk cannot produce an empty prompt; excess low-ranked chunks
/// are dropped, never truncated.
fn select_context(hits: &[ScoredChunk], char_budget: usize) -> Vec<ScoredChunk> {
    let mut included = Vec::new();
    let mut used_chars = 0usize;

    for hit in hits {
        let chunk_chars = hit.chunk.chars().count();
        if !included.is_empty() && used_chars + chunk_chars > char_budget {
            break;
        }
        used_chars += chunk_chars;
        included.push(hit.clone());
    }

    included
}

fn build_chat_request(
    question: &str,
    included: &[ScoredChunk],
    settings: &SystemSettings,
) -> Result<CreateChatCompletionRequest, OpenAIError> {
    let context = included
        .iter()
        .enumerate()
        .map(|(idx, hit)| {
            format!(
                "[Context {} - Source: {}]\n{}",
                idx + 1,
                hit.document_id,
                hit.chunk
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let user_message = format!(
        "Based on the following context, please answer the question. If the answer cannot be \
         found in the context, say so clearly.\n\n\
         Context:\n{context}\n\n\
         Question: {question}"
    );

    CreateChatCompletionRequestArgs::default()
        .model(&settings.query_model)
        .temperature(settings.query_temperature)
        .max_tokens(settings.query_max_tokens)
        .messages([
            ChatCompletionRequestSystemMessage::from(settings.query_system_prompt.clone()).into(),
            ChatCompletionRequestUserMessage::from(user_message).into(),
        ])
        .build()
}

fn distinct_sources(included: &[ScoredChunk]) -> Vec<String> {
    let mut sources = Vec::new();
    for hit in included {
        if !sources.contains(&hit.document_id) {
            sources.push(hit.document_id.clone());
        }
    }
    sources
}

fn derive_confidence(included: &[ScoredChunk], formula: ConfidenceFormula) -> f32 {
    if included.is_empty() {
        return 0.0;
    }
    let value = match formula {
        ConfidenceFormula::Mean => {
            included.iter().map(|hit| hit.similarity).sum::<f32>() / included.len() as f32
        }
        ConfidenceFormula::Max => included
            .iter()
            .map(|hit| hit.similarity)
            .fold(0.0f32, f32::max),
    };
    value.clamp(0.0, 1.0)
}
