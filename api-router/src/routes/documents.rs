use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use axum_typed_multipart::{FieldData, TryFromMultipart, TypedMultipart};
use chrono::{DateTime, Utc};
use common::{
    error::AppError,
    storage::types::{
        document::{Document, DocumentStatus},
        user::User,
    },
};
use ingestion_pipeline::DeclaredType;
use serde::Serialize;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, TryFromMultipart)]
pub struct UploadParams {
    #[form_data(limit = "26214400")]
    pub file: FieldData<Bytes>,
}

#[derive(Serialize, Debug)]
pub struct UploadResponse {
    pub document_id: String,
    pub chunk_count: u32,
}

pub async fn upload_document(
    State(state): State<ApiState>,
    Extension(user): Extension<User>,
    TypedMultipart(input): TypedMultipart<UploadParams>,
) -> Result<impl IntoResponse, ApiError> {
    let file_name = input
        .file
        .metadata
        .file_name
        .clone()
        .ok_or_else(|| AppError::Validation("upload is missing a file name".into()))?;

    let declared_type = DeclaredType::from_file_name(&file_name)?;

    info!(
        user_id = %user.id,
        file_name = %file_name,
        bytes = input.file.contents.len(),
        declared_type = declared_type.label(),
        "received document upload"
    );

    let outcome = state
        .ingestion
        .ingest(
            &user.id,
            &file_name,
            declared_type,
            input.file.contents.to_vec(),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            document_id: outcome.document_id,
            chunk_count: outcome.chunk_count,
        }),
    ))
}

#[derive(Serialize, Debug)]
pub struct DocumentSummary {
    pub id: String,
    pub file_name: String,
    pub file_size: u64,
    pub chunk_count: u32,
    pub uploaded_at: DateTime<Utc>,
    pub status: DocumentStatus,
}

pub async fn list_documents(
    State(state): State<ApiState>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<DocumentSummary>>, ApiError> {
    let documents = Document::list_for_user(&user.id, &state.db).await?;

    Ok(Json(
        documents
            .into_iter()
            .map(|document| DocumentSummary {
                id: document.id,
                file_name: document.file_name,
                file_size: document.file_size,
                chunk_count: document.chunk_count,
                uploaded_at: document.created_at,
                status: document.status,
            })
            .collect(),
    ))
}

#[derive(Serialize, Debug)]
pub struct DeleteResponse {
    pub vector_records_deleted: u64,
}

pub async fn delete_document(
    State(state): State<ApiState>,
    Extension(user): Extension<User>,
    Path(document_id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let outcome = state
        .consistency
        .delete_document(&user.id, &document_id)
        .await?;

    Ok(Json(DeleteResponse {
        vector_records_deleted: outcome.vector_records_deleted,
    }))
}
