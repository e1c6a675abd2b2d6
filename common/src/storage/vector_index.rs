use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{text_chunk::TextChunk, StoredObject},
    },
};

/// HNSW search breadth. Kept well above the context sizes the retrieval
/// engine asks for so recall is not the bottleneck.
const KNN_EF: usize = 40;

/// One ranked hit from the user's partition. Similarity is `1 - cosine
/// distance`, clamped to [0, 1].
#[derive(Debug, Clone, Deserialize)]
pub struct ScoredChunk {
    pub id: String,
    pub document_id: String,
    pub ordinal: u32,
    pub chunk: String,
    #[serde(default)]
    pub similarity: f32,
}

#[derive(Debug, Deserialize)]
struct KnnRow {
    id: String,
    document_id: String,
    ordinal: u32,
    chunk: String,
    distance: f32,
}

/// The vector store side of the system: embedding-bearing chunk records,
/// partitioned per user. Partitioning is enforced inside the similarity
/// query itself, never by post-filtering.
#[derive(Clone)]
pub struct VectorIndex {
    db: Arc<SurrealDbClient>,
}

impl VectorIndex {
    pub fn new(db: Arc<SurrealDbClient>) -> Self {
        Self { db }
    }

    /// Adds one record. An existing chunk id is never silently overwritten.
    pub async fn insert(&self, chunk: TextChunk) -> Result<(), AppError> {
        let chunk_id = chunk.id.clone();
        let created: Result<Option<TextChunk>, surrealdb::Error> = self
            .db
            .client
            .create((TextChunk::table_name(), chunk_id.as_str()))
            .content(chunk)
            .await;

        match created {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(AppError::InternalError(format!(
                "Vector record {chunk_id} was not created"
            ))),
            Err(err) if err.to_string().contains("already exists") => {
                Err(AppError::DuplicateRecord(chunk_id))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// K nearest records from the user's partition, ranked by descending
    /// similarity. Ties break by chunk ordinal, then chunk id, so repeated
    /// queries over an unchanged index return identical orderings. An empty
    /// partition yields an empty list, not an error.
    pub async fn query(
        &self,
        user_id: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, AppError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let knn_query = format!(
            "SELECT record::id(id) AS id, document_id, ordinal, chunk, \
             vector::distance::knn() AS distance \
             FROM {} WHERE user_id = '{}' AND embedding <|{},{}|> {:?} \
             ORDER BY distance",
            TextChunk::table_name(),
            user_id,
            top_k,
            KNN_EF,
            embedding
        );

        let mut rows: Vec<KnnRow> = self.db.client.query(knn_query).await?.take(0)?;

        rows.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.ordinal.cmp(&b.ordinal))
                .then_with(|| a.id.cmp(&b.id))
        });

        debug!(user_id, hits = rows.len(), "vector partition query");

        Ok(rows
            .into_iter()
            .map(|row| ScoredChunk {
                id: row.id,
                document_id: row.document_id,
                ordinal: row.ordinal,
                chunk: row.chunk,
                similarity: distance_to_similarity(row.distance),
            })
            .collect())
    }

    /// Removes every record of one document inside the user's partition and
    /// reports how many were removed. Deleting an absent document is not an
    /// error and reports zero.
    pub async fn delete_by_document(
        &self,
        user_id: &str,
        document_id: &str,
    ) -> Result<u64, AppError> {
        let removed: Vec<TextChunk> = self
            .db
            .client
            .query(format!(
                "DELETE {} WHERE user_id = $user_id AND document_id = $document_id RETURN BEFORE",
                TextChunk::table_name()
            ))
            .bind(("user_id", user_id.to_owned()))
            .bind(("document_id", document_id.to_owned()))
            .await?
            .take(0)?;

        Ok(removed.len() as u64)
    }

    /// Record count for one document; used by the reconciliation pass.
    pub async fn count_by_document(
        &self,
        user_id: &str,
        document_id: &str,
    ) -> Result<u64, AppError> {
        #[derive(Debug, Deserialize)]
        struct CountResult {
            count: u64,
        }

        let result: Option<CountResult> = self
            .db
            .client
            .query(
                "SELECT count() AS count FROM type::table($table_name) \
                 WHERE user_id = $user_id AND document_id = $document_id GROUP ALL",
            )
            .bind(("table_name", TextChunk::table_name()))
            .bind(("user_id", user_id.to_owned()))
            .bind(("document_id", document_id.to_owned()))
            .await?
            .take(0)?;

        Ok(result.map_or(0, |r| r.count))
    }
}

fn distance_to_similarity(distance: f32) -> f32 {
    (1.0 - distance).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    async fn setup_index() -> VectorIndex {
        let namespace = "test_ns";
        let database = &Uuid::new_v4().to_string();
        let db = SurrealDbClient::memory(namespace, database)
            .await
            .expect("Failed to start in-memory surrealdb");
        db.ensure_initialized(3)
            .await
            .expect("Failed to initialize schema");
        VectorIndex::new(Arc::new(db))
    }

    fn chunk(user_id: &str, document_id: &str, ordinal: u32, embedding: Vec<f32>) -> TextChunk {
        TextChunk::new(
            document_id.to_string(),
            user_id.to_string(),
            ordinal,
            format!("chunk {ordinal} of {document_id}"),
            embedding,
            u64::from(ordinal) * 10,
            u64::from(ordinal) * 10 + 10,
        )
    }

    #[tokio::test]
    async fn test_query_is_partitioned_per_user() {
        let index = setup_index().await;

        index
            .insert(chunk("user_a", "doc_a", 0, vec![1.0, 0.0, 0.0]))
            .await
            .expect("insert a");
        index
            .insert(chunk("user_b", "doc_b", 0, vec![1.0, 0.0, 0.0]))
            .await
            .expect("insert b");

        let hits = index
            .query("user_a", &[1.0, 0.0, 0.0], 10)
            .await
            .expect("query");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document_id, "doc_a");
    }

    #[tokio::test]
    async fn test_query_orders_by_similarity_then_ordinal() {
        let index = setup_index().await;

        // Same distance for ordinals 1 and 2, nearer vector for ordinal 0.
        index
            .insert(chunk("user_a", "doc_a", 2, vec![0.0, 1.0, 0.0]))
            .await
            .expect("insert");
        index
            .insert(chunk("user_a", "doc_a", 1, vec![0.0, 1.0, 0.0]))
            .await
            .expect("insert");
        index
            .insert(chunk("user_a", "doc_a", 0, vec![1.0, 0.0, 0.0]))
            .await
            .expect("insert");

        let hits = index
            .query("user_a", &[1.0, 0.0, 0.0], 10)
            .await
            .expect("query");
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].ordinal, 0);
        assert!(hits[0].similarity > hits[1].similarity);
        // Equidistant chunks come back in ordinal order.
        assert_eq!(hits[1].ordinal, 1);
        assert_eq!(hits[2].ordinal, 2);
    }

    #[tokio::test]
    async fn test_query_empty_partition_returns_empty() {
        let index = setup_index().await;
        let hits = index
            .query("nobody", &[1.0, 0.0, 0.0], 5)
            .await
            .expect("query");
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_chunk_id() {
        let index = setup_index().await;

        let first = chunk("user_a", "doc_a", 0, vec![1.0, 0.0, 0.0]);
        let mut second = chunk("user_a", "doc_a", 1, vec![0.0, 1.0, 0.0]);
        second.id = first.id.clone();

        index.insert(first).await.expect("first insert");
        let err = index.insert(second).await.expect_err("duplicate id");
        assert!(matches!(err, AppError::DuplicateRecord(_)));
    }

    #[tokio::test]
    async fn test_delete_by_document_counts_and_is_idempotent() {
        let index = setup_index().await;

        index
            .insert(chunk("user_a", "doc_a", 0, vec![1.0, 0.0, 0.0]))
            .await
            .expect("insert");
        index
            .insert(chunk("user_a", "doc_a", 1, vec![0.0, 1.0, 0.0]))
            .await
            .expect("insert");
        index
            .insert(chunk("user_a", "doc_keep", 0, vec![0.0, 0.0, 1.0]))
            .await
            .expect("insert");

        let removed = index
            .delete_by_document("user_a", "doc_a")
            .await
            .expect("delete");
        assert_eq!(removed, 2);

        let removed_again = index
            .delete_by_document("user_a", "doc_a")
            .await
            .expect("repeat delete");
        assert_eq!(removed_again, 0);

        let remaining = index
            .count_by_document("user_a", "doc_keep")
            .await
            .expect("count");
        assert_eq!(remaining, 1);
    }

    #[test]
    fn test_distance_to_similarity_is_clamped() {
        assert!((distance_to_similarity(0.0) - 1.0).abs() < f32::EPSILON);
        assert!((distance_to_similarity(1.0)).abs() < f32::EPSILON);
        assert!((distance_to_similarity(2.0)).abs() < f32::EPSILON);
        assert!((distance_to_similarity(-0.5) - 1.0).abs() < f32::EPSILON);
    }
}
