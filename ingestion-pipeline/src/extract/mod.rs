mod pdf;
mod plain_text;

pub use pdf::PdfExtractor;
pub use plain_text::PlainTextExtractor;

use async_trait::async_trait;
use common::error::AppError;

/// File types the ingestion surface accepts, keyed by the caller's
/// declaration rather than by sniffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclaredType {
    Txt,
    Pdf,
}

impl DeclaredType {
    pub fn parse(label: &str) -> Result<Self, AppError> {
        match label.to_ascii_lowercase().as_str() {
            "txt" => Ok(Self::Txt),
            "pdf" => Ok(Self::Pdf),
            other => Err(AppError::UnsupportedFileType(other.to_string())),
        }
    }

    /// Declared type from an uploaded file name's extension.
    pub fn from_file_name(file_name: &str) -> Result<Self, AppError> {
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .ok_or_else(|| AppError::UnsupportedFileType(file_name.to_string()))?;
        Self::parse(extension)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Txt => "txt",
            Self::Pdf => "pdf",
        }
    }
}

/// Capability interface for turning uploaded bytes into plain text. One
/// variant per supported type; adding a type does not touch ingestion logic.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, bytes: Vec<u8>) -> Result<String, AppError>;
}

pub fn extractor_for(declared: DeclaredType) -> Box<dyn TextExtractor> {
    match declared {
        DeclaredType::Txt => Box::new(PlainTextExtractor),
        DeclaredType::Pdf => Box::new(PdfExtractor),
    }
}
