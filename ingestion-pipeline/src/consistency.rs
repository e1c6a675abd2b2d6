use std::sync::Arc;

use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::document::{Document, DocumentStatus},
        vector_index::VectorIndex,
    },
};
use tracing::{info, instrument, warn};

use crate::locks::DocumentLocks;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub vector_records_deleted: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub dangling_documents_removed: Vec<String>,
}

/// Coordinates document deletion across the metadata store and the vector
/// index, and repairs the drift the non-transactional pair can accumulate.
///
/// Deletion order is vector index first, metadata second: a crash in between
/// leaves a metadata row without vector records, which listing still shows
/// and [`ConsistencyManager::reconcile`] can detect. The reverse order could
/// strand vector records no listing ever surfaces.
pub struct ConsistencyManager {
    db: Arc<SurrealDbClient>,
    vector_index: VectorIndex,
    locks: Arc<DocumentLocks>,
}

impl ConsistencyManager {
    pub fn new(db: Arc<SurrealDbClient>, locks: Arc<DocumentLocks>) -> Self {
        Self {
            vector_index: VectorIndex::new(Arc::clone(&db)),
            db,
            locks,
        }
    }

    #[instrument(skip(self), fields(user_id = %user_id, document_id = %document_id))]
    pub async fn delete_document(
        &self,
        user_id: &str,
        document_id: &str,
    ) -> Result<DeleteOutcome, AppError> {
        let _guard = self.locks.acquire(user_id, document_id).await;

        // Ownership check before any vector-index call.
        let document = Document::find_owned(document_id, user_id, &self.db).await?;

        let vector_records_deleted = self
            .vector_index
            .delete_by_document(user_id, document_id)
            .await?;

        if let Err(err) = self.db.delete_item::<Document>(document_id).await {
            warn!(
                error = %err,
                "vector records removed but the metadata row remains; a reconcile pass will repair it"
            );
            return Err(err.into());
        }

        info!(
            vector_records_deleted,
            chunk_count = document.chunk_count,
            "document deleted"
        );

        Ok(DeleteOutcome {
            vector_records_deleted,
        })
    }

    /// Repairs the accepted transient inconsistency: a finalized metadata
    /// row whose document has no vector records is dangling and is removed.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn reconcile(&self, user_id: &str) -> Result<ReconcileReport, AppError> {
        let documents = Document::list_for_user(user_id, &self.db).await?;
        let mut report = ReconcileReport::default();

        for document in documents {
            let _guard = self.locks.acquire(user_id, &document.id).await;

            // Re-read under the lock; a concurrent delete may have won.
            let Some(current) = self.db.get_item::<Document>(&document.id).await? else {
                continue;
            };
            if current.status != DocumentStatus::Ready {
                continue;
            }

            let vector_records = self
                .vector_index
                .count_by_document(user_id, &current.id)
                .await?;
            if vector_records > 0 {
                continue;
            }

            self.db.delete_item::<Document>(&current.id).await?;
            warn!(
                document_id = %current.id,
                chunk_count = current.chunk_count,
                "removed dangling metadata row with no vector records"
            );
            report.dangling_documents_removed.push(current.id);
        }

        Ok(report)
    }
}
