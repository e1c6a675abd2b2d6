use async_trait::async_trait;
use common::error::AppError;
use lopdf::Document;

use super::TextExtractor;

const MIN_ASCII_RATIO: f64 = 0.7;
const MIN_LETTER_RATIO: f64 = 0.3;

/// Extractor for declared `pdf` uploads. Reads the embedded text layer;
/// PDFs without a usable layer (scans, corrupt files) are rejected rather
/// than indexed as garbage.
pub struct PdfExtractor;

#[async_trait]
impl TextExtractor for PdfExtractor {
    async fn extract(&self, bytes: Vec<u8>) -> Result<String, AppError> {
        let text = tokio::task::spawn_blocking(move || -> Result<String, AppError> {
            let document = Document::load_mem(&bytes)
                .map_err(|err| AppError::ExtractionFailed(format!("Failed to parse PDF: {err}")))?;
            if document.get_pages().is_empty() {
                return Err(AppError::ExtractionFailed("PDF has no pages".into()));
            }

            pdf_extract::extract_text_from_mem(&bytes)
                .map(|text| text.trim().to_string())
                .map_err(|err| {
                    AppError::ExtractionFailed(format!("Failed to extract text from PDF: {err}"))
                })
        })
        .await??;

        if text.is_empty() {
            return Err(AppError::ExtractionFailed(
                "PDF contains no extractable text layer".into(),
            ));
        }

        if !text_layer_usable(&text) {
            return Err(AppError::ExtractionFailed(
                "PDF text layer is too noisy to index".into(),
            ));
        }

        Ok(text)
    }
}

/// Heuristic that determines whether the text layer looks like prose rather
/// than extraction noise.
fn text_layer_usable(text: &str) -> bool {
    let total_chars = text.chars().count() as f64;
    if total_chars == 0.0 {
        return false;
    }

    let ascii_chars = text.chars().filter(|c| c.is_ascii()).count() as f64;
    if ascii_chars / total_chars < MIN_ASCII_RATIO {
        return false;
    }

    let letters = text.chars().filter(|c| c.is_alphabetic()).count() as f64;
    letters / total_chars > MIN_LETTER_RATIO
}
