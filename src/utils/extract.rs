use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Failed to read uploaded file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to store uploaded file: {0}")]
    Store(std::io::Error),

    #[error("PDF extraction error: {0}")]
    Pdf(String),

    #[error("Image extraction error: {0}")]
    Ocr(String),
}

/// Turns a stored document into plain text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, path: &Path) -> Result<String, ExtractionError>;
}
