use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::error::AppError;
use serde::Serialize;
use thiserror::Error;

/// HTTP-facing error. Each response body carries the stable `kind` from the
/// underlying [`AppError`] so clients can branch without parsing free text.
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error("Internal server error")]
    InternalError { kind: &'static str },

    #[error("{message}")]
    BadRequest { kind: &'static str, message: String },

    #[error("{message}")]
    NotFound { kind: &'static str, message: String },

    #[error("{message}")]
    Forbidden { kind: &'static str, message: String },

    #[error("{message}")]
    Unauthorized { message: String },

    #[error("{message}")]
    PayloadTooLarge { kind: &'static str, message: String },

    #[error("{message}")]
    Unavailable { kind: &'static str, message: String },
}

impl ApiError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        let kind = err.kind();
        match &err {
            AppError::InvalidConfiguration(_)
            | AppError::UnsupportedFileType(_)
            | AppError::ExtractionFailed(_)
            | AppError::EmptyDocument
            | AppError::EmptyQuestion
            | AppError::DuplicateRecord(_)
            | AppError::Validation(_) => Self::BadRequest {
                kind,
                message: err.to_string(),
            },
            AppError::FileTooLarge { .. } => Self::PayloadTooLarge {
                kind,
                message: err.to_string(),
            },
            AppError::NotFound(_) => Self::NotFound {
                kind,
                message: err.to_string(),
            },
            AppError::Forbidden(_) => Self::Forbidden {
                kind,
                message: err.to_string(),
            },
            AppError::EmbeddingUnavailable(_) | AppError::AnswerGenerationFailed(_) => {
                tracing::error!(kind, error = %err, "upstream dependency failure");
                Self::Unavailable {
                    kind,
                    message: err.to_string(),
                }
            }
            AppError::Database(_)
            | AppError::OpenAI(_)
            | AppError::Io(_)
            | AppError::Join(_)
            | AppError::InternalError(_) => {
                tracing::error!(kind, error = %err, "internal error");
                Self::InternalError { kind }
            }
        }
    }
}

#[derive(Serialize, Debug)]
struct ErrorResponse {
    error: String,
    kind: String,
    status: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match &self {
            Self::InternalError { kind } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                *kind,
                "Internal server error".to_string(),
            ),
            Self::BadRequest { kind, message } => {
                (StatusCode::BAD_REQUEST, *kind, message.clone())
            }
            Self::NotFound { kind, message } => (StatusCode::NOT_FOUND, *kind, message.clone()),
            Self::Forbidden { kind, message } => (StatusCode::FORBIDDEN, *kind, message.clone()),
            Self::Unauthorized { message } => {
                (StatusCode::UNAUTHORIZED, "unauthorized", message.clone())
            }
            Self::PayloadTooLarge { kind, message } => {
                (StatusCode::PAYLOAD_TOO_LARGE, *kind, message.clone())
            }
            Self::Unavailable { kind, message } => {
                (StatusCode::SERVICE_UNAVAILABLE, *kind, message.clone())
            }
        };

        let body = ErrorResponse {
            error: message,
            kind: kind.to_string(),
            status: "error".to_string(),
        };

        (status, Json(body)).into_response()
    }
}
