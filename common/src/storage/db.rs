use std::ops::Deref;

use surrealdb::{
    engine::any::{connect, Any},
    opt::auth::Root,
    Error, Surreal,
};

use super::types::StoredObject;
use crate::error::AppError;

#[derive(Clone)]
pub struct SurrealDbClient {
    pub client: Surreal<Any>,
}

impl SurrealDbClient {
    pub async fn new(
        address: &str,
        username: &str,
        password: &str,
        namespace: &str,
        database: &str,
    ) -> Result<Self, Error> {
        let db = connect(address).await?;

        db.signin(Root { username, password }).await?;

        db.use_ns(namespace).use_db(database).await?;

        Ok(SurrealDbClient { client: db })
    }

    /// Defines the tables and indexes both stores rely on. The HNSW index
    /// dimension must match the embedding provider's output dimension.
    pub async fn ensure_initialized(&self, embedding_dimension: usize) -> Result<(), AppError> {
        self.client
            .query(
                "DEFINE TABLE IF NOT EXISTS user SCHEMALESS;
                 DEFINE INDEX IF NOT EXISTS idx_user_email ON TABLE user FIELDS email UNIQUE;
                 DEFINE INDEX IF NOT EXISTS idx_user_api_key ON TABLE user FIELDS api_key;
                 DEFINE INDEX IF NOT EXISTS idx_document_user ON TABLE document FIELDS user_id;
                 DEFINE INDEX IF NOT EXISTS idx_chunk_user ON TABLE text_chunk FIELDS user_id;
                 DEFINE INDEX IF NOT EXISTS idx_chunk_document ON TABLE text_chunk FIELDS document_id;
                 DEFINE INDEX IF NOT EXISTS idx_query_log_user ON TABLE query_log FIELDS user_id;",
            )
            .await?;

        self.client
            .query(format!(
                "DEFINE INDEX IF NOT EXISTS idx_embedding_text_chunk ON TABLE text_chunk \
                 FIELDS embedding HNSW DIMENSION {embedding_dimension} DIST COSINE TYPE F32 EFC 100 M 8;"
            ))
            .await?;

        Ok(())
    }

    /// Redefines the vector index after an embedding dimension change.
    /// Existing records must be re-embedded separately before queries make
    /// sense again.
    pub async fn redefine_vector_index(&self, embedding_dimension: usize) -> Result<(), AppError> {
        self.client
            .query(format!(
                "DEFINE INDEX OVERWRITE idx_embedding_text_chunk ON TABLE text_chunk \
                 FIELDS embedding HNSW DIMENSION {embedding_dimension} DIST COSINE TYPE F32 EFC 100 M 8;"
            ))
            .await?;
        Ok(())
    }

    pub async fn store_item<T>(&self, item: T) -> Result<Option<T>, Error>
    where
        T: StoredObject + Send + Sync + 'static,
    {
        self.client
            .create((T::table_name(), item.get_id()))
            .content(item)
            .await
    }

    pub async fn get_item<T>(&self, id: &str) -> Result<Option<T>, Error>
    where
        T: for<'de> StoredObject,
    {
        self.client.select((T::table_name(), id)).await
    }

    pub async fn delete_item<T>(&self, id: &str) -> Result<Option<T>, Error>
    where
        T: for<'de> StoredObject,
    {
        self.client.delete((T::table_name(), id)).await
    }

    pub async fn get_all_stored_items<T>(&self) -> Result<Vec<T>, Error>
    where
        T: for<'de> StoredObject,
    {
        self.client.select(T::table_name()).await
    }
}

impl Deref for SurrealDbClient {
    type Target = Surreal<Any>;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl SurrealDbClient {
    /// Create an in-memory SurrealDB client for testing.
    pub async fn memory(namespace: &str, database: &str) -> Result<Self, Error> {
        let db = connect("mem://").await?;

        db.use_ns(namespace).use_db(database).await?;

        Ok(SurrealDbClient { client: db })
    }
}
