use uuid::Uuid;

use crate::stored_object;

stored_object!(TextChunk, "text_chunk", {
    document_id: String,
    user_id: String,
    ordinal: u32,
    chunk: String,
    embedding: Vec<f32>,
    start_byte: u64,
    end_byte: u64
});

impl TextChunk {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        document_id: String,
        user_id: String,
        ordinal: u32,
        chunk: String,
        embedding: Vec<f32>,
        start_byte: u64,
        end_byte: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            document_id,
            user_id,
            ordinal,
            chunk,
            embedding,
            start_byte,
            end_byte,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_text_chunk_creation() {
        let chunk = TextChunk::new(
            "doc123".to_string(),
            "user123".to_string(),
            2,
            "a window of extracted text".to_string(),
            vec![0.1, 0.2, 0.3],
            100,
            126,
        );

        assert_eq!(chunk.document_id, "doc123");
        assert_eq!(chunk.user_id, "user123");
        assert_eq!(chunk.ordinal, 2);
        assert_eq!(chunk.embedding.len(), 3);
        assert_eq!(chunk.start_byte, 100);
        assert_eq!(chunk.end_byte, 126);
        assert!(!chunk.id.is_empty());
    }
}
