mod state;

use std::sync::Arc;

use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{document::Document, text_chunk::TextChunk},
        vector_index::VectorIndex,
    },
    utils::{config::AppConfig, embedding::Embedder},
};
use sha2::{Digest, Sha256};
use state_machines::core::GuardError;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{
    chunker::Chunker,
    extract::{extractor_for, DeclaredType},
    locks::DocumentLocks,
};

use self::state::received;

/// Result of a successful ingestion: the document is immediately visible to
/// retrieval for its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub document_id: String,
    pub chunk_count: u32,
}

/// Orchestrates extract → chunk → embed → index → record for one upload.
/// All-or-nothing: any failure rolls back vector records already inserted so
/// no partial document is ever indexed.
#[allow(clippy::module_name_repetitions)]
pub struct IngestionPipeline {
    db: Arc<SurrealDbClient>,
    vector_index: VectorIndex,
    embedder: Arc<dyn Embedder>,
    chunker: Chunker,
    locks: Arc<DocumentLocks>,
    max_file_size_bytes: u64,
}

impl IngestionPipeline {
    pub fn new(
        db: Arc<SurrealDbClient>,
        embedder: Arc<dyn Embedder>,
        locks: Arc<DocumentLocks>,
        config: &AppConfig,
    ) -> Result<Self, AppError> {
        let chunker = Chunker::new(config.chunk_size, config.chunk_overlap)?;

        Ok(Self {
            vector_index: VectorIndex::new(Arc::clone(&db)),
            db,
            embedder,
            chunker,
            locks,
            max_file_size_bytes: config.max_file_size_bytes,
        })
    }

    #[tracing::instrument(
        skip_all,
        fields(user_id = %user_id, file_name = %file_name, bytes = bytes.len())
    )]
    pub async fn ingest(
        &self,
        user_id: &str,
        file_name: &str,
        declared_type: DeclaredType,
        bytes: Vec<u8>,
    ) -> Result<IngestOutcome, AppError> {
        let file_size = bytes.len() as u64;
        if file_size > self.max_file_size_bytes {
            return Err(AppError::FileTooLarge {
                size: file_size,
                limit: self.max_file_size_bytes,
            });
        }

        let document_id = Uuid::new_v4().to_string();
        let _guard = self.locks.acquire(user_id, &document_id).await;
        let machine = received();

        let sha256 = format!("{:x}", Sha256::digest(&bytes));

        let text = extractor_for(declared_type).extract(bytes).await?;
        let machine = machine
            .extract()
            .map_err(|(_, guard)| map_guard_error("extract", &guard))?;

        let spans = self.chunker.chunk(&text);
        if spans.is_empty() {
            return Err(AppError::EmptyDocument);
        }
        let machine = machine
            .chunk()
            .map_err(|(_, guard)| map_guard_error("chunk", &guard))?;

        debug!(
            document_id = %document_id,
            chunks = spans.len(),
            declared_type = declared_type.label(),
            "embedding document chunks"
        );

        let embeddings = self
            .embedder
            .embed_batch(spans.iter().map(|span| span.text.clone()).collect())
            .await?;
        if embeddings.len() != spans.len() {
            return Err(AppError::EmbeddingUnavailable(format!(
                "embedding batch returned {} vectors for {} chunks",
                embeddings.len(),
                spans.len()
            )));
        }
        let machine = machine
            .embed()
            .map_err(|(_, guard)| map_guard_error("embed", &guard))?;

        let chunk_count = spans.len() as u32;
        for (span, embedding) in spans.into_iter().zip(embeddings) {
            let chunk = TextChunk::new(
                document_id.clone(),
                user_id.to_owned(),
                span.ordinal,
                span.text,
                embedding,
                span.start_byte,
                span.end_byte,
            );
            if let Err(err) = self.vector_index.insert(chunk).await {
                self.rollback_vector_records(user_id, &document_id).await;
                return Err(err);
            }
        }

        let mut document = Document::new(
            user_id.to_owned(),
            file_name.to_owned(),
            file_size,
            sha256,
            chunk_count,
        );
        document.id = document_id.clone();

        match self.db.store_item(document).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                self.rollback_vector_records(user_id, &document_id).await;
                return Err(AppError::InternalError(format!(
                    "Document {document_id} was not recorded"
                )));
            }
            Err(err) => {
                self.rollback_vector_records(user_id, &document_id).await;
                return Err(err.into());
            }
        }

        let _machine = machine
            .persist()
            .map_err(|(_, guard)| map_guard_error("persist", &guard))?;

        info!(
            document_id = %document_id,
            chunk_count,
            file_size,
            "document ingested"
        );

        Ok(IngestOutcome {
            document_id,
            chunk_count,
        })
    }

    /// Compensating step of the ingestion saga: vector inserts committed
    /// before a later failure must not outlive the aborted document.
    async fn rollback_vector_records(&self, user_id: &str, document_id: &str) {
        match self
            .vector_index
            .delete_by_document(user_id, document_id)
            .await
        {
            Ok(removed) => {
                debug!(document_id = %document_id, removed, "rolled back vector records");
            }
            Err(err) => {
                // The document row was never written, so these records are
                // invisible to listing; reconciliation cannot find them.
                error!(
                    document_id = %document_id,
                    error = %err,
                    "failed to roll back vector records after aborted ingestion"
                );
            }
        }
    }
}

fn map_guard_error(stage: &str, guard: &GuardError) -> AppError {
    AppError::InternalError(format!(
        "ingestion state machine rejected {stage}: {guard:?}"
    ))
}
