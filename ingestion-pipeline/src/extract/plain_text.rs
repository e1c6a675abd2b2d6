use async_trait::async_trait;
use common::error::AppError;

use super::TextExtractor;

/// Extractor for declared `txt` uploads: UTF-8 with a Latin-1 fallback for
/// legacy files. An empty file passes through as an empty string so the
/// pipeline reports zero chunks rather than an extraction failure.
pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, bytes: Vec<u8>) -> Result<String, AppError> {
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => latin1_to_string(err.as_bytes()),
        };

        if !text.is_empty() && text.trim().is_empty() {
            return Err(AppError::ExtractionFailed(
                "file contains only whitespace".into(),
            ));
        }

        Ok(text)
    }
}

fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_extracts_utf8() {
        let text = PlainTextExtractor
            .extract("héllo wörld".as_bytes().to_vec())
            .await
            .expect("utf8 extraction");
        assert_eq!(text, "héllo wörld");
    }

    #[tokio::test]
    async fn test_falls_back_to_latin1() {
        // 0xE9 is 'é' in Latin-1 but invalid standalone UTF-8.
        let text = PlainTextExtractor
            .extract(vec![b'c', b'a', b'f', 0xE9])
            .await
            .expect("latin1 fallback");
        assert_eq!(text, "café");
    }

    #[tokio::test]
    async fn test_empty_file_yields_empty_string() {
        let text = PlainTextExtractor
            .extract(Vec::new())
            .await
            .expect("empty extraction");
        assert!(text.is_empty());
    }

    #[tokio::test]
    async fn test_whitespace_only_is_unusable() {
        let err = PlainTextExtractor
            .extract(b"   \n\t  ".to_vec())
            .await
            .expect_err("whitespace only");
        assert_eq!(err.kind(), "extraction_failed");
    }
}
