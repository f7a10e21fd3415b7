// PDF text extraction for uploaded documents.
// Always keep this module small and dependency-light.

use async_trait::async_trait;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

use super::extract::{ExtractionError, TextExtractor};

/// Extracts the text of every page of an in-memory PDF, in document order.
/// This is a thin wrapper over the `pdf-extract` crate API.
pub fn extract_pages_from_pdf_mem(bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
    pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ExtractionError::Pdf(e.to_string()))
}

/// Trims every page and concatenates them without separators.
/// pdf-extract pads page text with layout newlines, which are dropped here.
pub fn join_pages<S: AsRef<str>>(pages: &[S]) -> String {
    let mut text = String::new();
    for page in pages {
        text.push_str(page.as_ref().trim());
    }
    text
}

/// Returns true if the file starts with the `%PDF-` magic bytes.
pub fn has_pdf_signature(head: &[u8]) -> bool {
    head.starts_with(b"%PDF-")
}

/// [`TextExtractor`] for PDF files on disk.
#[derive(Debug, Default, Clone)]
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TextExtractor for PdfExtractor {
    async fn extract(&self, path: &Path) -> Result<String, ExtractionError> {
        let bytes = tokio::fs::read(path).await?;

        if !has_pdf_signature(&bytes) {
            warn!(path = %path.display(), "Upload has a .pdf name but no %PDF- signature");
        }

        let started = Instant::now();
        // pdf-extract is CPU bound and may panic on malformed input; the
        // blocking pool turns a panic into a JoinError instead of unwinding here.
        let pages = tokio::task::spawn_blocking(move || extract_pages_from_pdf_mem(&bytes))
            .await
            .map_err(|e| {
                if e.is_panic() {
                    ExtractionError::Pdf("the PDF parser crashed on this document".to_string())
                } else {
                    ExtractionError::Pdf(e.to_string())
                }
            })??;

        let text = join_pages(&pages);
        info!(
            path = %path.display(),
            pages = pages.len(),
            chars = text.chars().count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "PDF extraction succeeded"
        );
        Ok(text)
    }
}
