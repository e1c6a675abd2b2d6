use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

/// Lifecycle of a document row. Rows are only written after the vector
/// inserts committed, so `Ready` is the common case; `Failed` marks rows a
/// repair pass has flagged but not yet removed.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Ready,
    Failed,
}

stored_object!(Document, "document", {
    user_id: String,
    file_name: String,
    file_size: u64,
    sha256: String,
    chunk_count: u32,
    status: DocumentStatus
});

impl Document {
    pub fn new(
        user_id: String,
        file_name: String,
        file_size: u64,
        sha256: String,
        chunk_count: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            user_id,
            file_name,
            file_size,
            sha256,
            chunk_count,
            status: DocumentStatus::Ready,
        }
    }

    /// Fetches a document and verifies ownership. A missing row and a row
    /// owned by someone else both come back as `NotFound` so document
    /// existence does not leak across users.
    pub async fn find_owned(
        id: &str,
        user_id: &str,
        db: &SurrealDbClient,
    ) -> Result<Self, AppError> {
        let document: Option<Self> = db.get_item(id).await?;

        match document {
            Some(document) if document.user_id == user_id => Ok(document),
            _ => Err(AppError::NotFound(format!("Document {id} not found"))),
        }
    }

    /// All documents owned by the user, newest upload first.
    pub async fn list_for_user(
        user_id: &str,
        db: &SurrealDbClient,
    ) -> Result<Vec<Self>, AppError> {
        let documents: Vec<Self> = db
            .client
            .query(
                "SELECT * FROM type::table($table_name) WHERE user_id = $user_id ORDER BY created_at DESC",
            )
            .bind(("table_name", Self::table_name()))
            .bind(("user_id", user_id.to_owned()))
            .await?
            .take(0)?;

        Ok(documents)
    }

    pub async fn count_for_user(user_id: &str, db: &SurrealDbClient) -> Result<u64, AppError> {
        #[derive(Debug, Deserialize)]
        struct CountResult {
            count: u64,
        }

        let result: Option<CountResult> = db
            .client
            .query("SELECT count() AS count FROM type::table($table) WHERE user_id = $user_id GROUP ALL")
            .bind(("table", Self::table_name()))
            .bind(("user_id", user_id.to_owned()))
            .await?
            .take(0)?;

        Ok(result.map_or(0, |r| r.count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_document_creation() {
        let document = Document::new(
            "user123".to_string(),
            "notes.txt".to_string(),
            2048,
            "deadbeef".to_string(),
            3,
        );

        assert_eq!(document.user_id, "user123");
        assert_eq!(document.file_name, "notes.txt");
        assert_eq!(document.file_size, 2048);
        assert_eq!(document.chunk_count, 3);
        assert_eq!(document.status, DocumentStatus::Ready);
        assert!(!document.id.is_empty());
    }

    #[tokio::test]
    async fn test_find_owned_rejects_foreign_and_missing() {
        let namespace = "test_ns";
        let database = &uuid::Uuid::new_v4().to_string();
        let db = SurrealDbClient::memory(namespace, database)
            .await
            .expect("Failed to start in-memory surrealdb");

        let document = Document::new(
            "owner".to_string(),
            "report.pdf".to_string(),
            4096,
            "cafe".to_string(),
            2,
        );
        db.store_item(document.clone())
            .await
            .expect("Failed to store document");

        let found = Document::find_owned(&document.id, "owner", &db)
            .await
            .expect("Owner lookup should succeed");
        assert_eq!(found.id, document.id);

        let foreign = Document::find_owned(&document.id, "other_user", &db).await;
        assert!(matches!(foreign, Err(AppError::NotFound(_))));

        let missing = Document::find_owned("does-not-exist", "owner", &db).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_for_user_is_scoped_and_ordered() {
        let namespace = "test_ns";
        let database = &uuid::Uuid::new_v4().to_string();
        let db = SurrealDbClient::memory(namespace, database)
            .await
            .expect("Failed to start in-memory surrealdb");

        let mut older = Document::new(
            "user_a".to_string(),
            "first.txt".to_string(),
            10,
            "aa".to_string(),
            1,
        );
        older.created_at = Utc::now() - chrono::Duration::minutes(5);
        let newer = Document::new(
            "user_a".to_string(),
            "second.txt".to_string(),
            20,
            "bb".to_string(),
            1,
        );
        let foreign = Document::new(
            "user_b".to_string(),
            "other.txt".to_string(),
            30,
            "cc".to_string(),
            1,
        );

        db.store_item(older.clone()).await.expect("store older");
        db.store_item(newer.clone()).await.expect("store newer");
        db.store_item(foreign).await.expect("store foreign");

        let listed = Document::list_for_user("user_a", &db)
            .await
            .expect("Failed to list documents");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, newer.id);
        assert_eq!(listed[1].id, older.id);

        let count = Document::count_for_user("user_a", &db)
            .await
            .expect("Failed to count documents");
        assert_eq!(count, 2);
    }
}
