use async_openai::error::OpenAIError;
use thiserror::Error;
use tokio::task::JoinError;

// Core internal errors. Every variant maps to a stable, caller-visible kind
// via [`AppError::kind`]; the display string carries the free-text detail.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] surrealdb::Error),
    #[error("LLM endpoint error: {0}")]
    OpenAI(#[from] OpenAIError),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Task join error: {0}")]
    Join(#[from] JoinError),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("File of {size} bytes exceeds the {limit} byte ceiling")]
    FileTooLarge { size: u64, limit: u64 },
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),
    #[error("Text extraction failed: {0}")]
    ExtractionFailed(String),
    #[error("Document yielded no chunks")]
    EmptyDocument,
    #[error("Question is empty")]
    EmptyQuestion,
    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),
    #[error("Duplicate vector record: {0}")]
    DuplicateRecord(String),
    #[error("Answer generation failed: {0}")]
    AnswerGenerationFailed(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl AppError {
    /// Stable machine-readable kind, independent of the diagnostic detail.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Database(_) => "database",
            Self::OpenAI(_) => "llm",
            Self::Io(_) => "io",
            Self::Join(_) | Self::InternalError(_) => "internal",
            Self::InvalidConfiguration(_) => "invalid_configuration",
            Self::FileTooLarge { .. } => "file_too_large",
            Self::UnsupportedFileType(_) => "unsupported_file_type",
            Self::ExtractionFailed(_) => "extraction_failed",
            Self::EmptyDocument => "empty_document",
            Self::EmptyQuestion => "empty_question",
            Self::EmbeddingUnavailable(_) => "embedding_unavailable",
            Self::DuplicateRecord(_) => "duplicate_record",
            Self::AnswerGenerationFailed(_) => "answer_generation_failed",
            Self::NotFound(_) => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::Validation(_) => "validation",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_stable_and_detail_free() {
        let err = AppError::FileTooLarge {
            size: 11_000_000,
            limit: 10_485_760,
        };
        assert_eq!(err.kind(), "file_too_large");
        assert!(err.to_string().contains("11000000"));

        assert_eq!(AppError::EmptyDocument.kind(), "empty_document");
        assert_eq!(
            AppError::NotFound("document xyz".into()).kind(),
            "not_found"
        );
        assert_eq!(
            AppError::AnswerGenerationFailed("rate limited".into()).kind(),
            "answer_generation_failed"
        );
    }
}
