use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::utils::extract::{ExtractionError, TextExtractor};
use crate::utils::summarizer::{Summarize, SummarizeError};
use crate::utils::upload::{DocumentKind, ScratchFile};
use crate::web::types::Flash;

pub const UNSUPPORTED_FILE_MESSAGE: &str = "Unsupported or missing file.";
pub const NO_VALID_INPUT_MESSAGE: &str = "No valid input found.";

/// A file part of the submitted form.
#[derive(Debug, Clone, Default)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// What a single POST carried.
#[derive(Debug, Clone)]
pub enum Submission {
    Text(String),
    File(UploadedFile),
    Empty,
}

impl Submission {
    /// Applies the precedence rule: non-blank text wins, then the file part.
    pub fn from_parts(text: Option<String>, file: Option<UploadedFile>) -> Self {
        match (text, file) {
            (Some(text), _) if !text.trim().is_empty() => Self::Text(text),
            (_, Some(file)) => Self::File(file),
            _ => Self::Empty,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::File(_) => "file",
            Self::Empty => "empty",
        }
    }
}

/// Result of processing one submission. `result` is `None` when there is
/// nothing to show.
#[derive(Debug, Default)]
pub struct Outcome {
    pub flashes: Vec<Flash>,
    pub result: Option<Result<String, SummarizeError>>,
}

/// Runs the submission pipeline: pick the input, extract text from uploads,
/// summarize whatever text came out.
#[derive(Clone)]
pub struct SubmissionHandler {
    upload_dir: PathBuf,
    pdf: Arc<dyn TextExtractor>,
    ocr: Arc<dyn TextExtractor>,
    summarizer: Arc<dyn Summarize>,
}

impl SubmissionHandler {
    pub fn new(
        upload_dir: PathBuf,
        pdf: Arc<dyn TextExtractor>,
        ocr: Arc<dyn TextExtractor>,
        summarizer: Arc<dyn Summarize>,
    ) -> Self {
        Self {
            upload_dir,
            pdf,
            ocr,
            summarizer,
        }
    }

    pub async fn process(&self, submission: Submission) -> Outcome {
        let mut outcome = Outcome::default();
        info!(kind = submission.kind(), "Processing submission");

        let input_text = match submission {
            Submission::Text(text) => text.trim().to_string(),
            Submission::File(file) => match self.text_from_file(&file).await {
                Ok(text) => text,
                Err(FileRejection::Unsupported) => {
                    info!(file_name = %file.file_name, "Rejected upload");
                    outcome.flashes.push(Flash::danger(UNSUPPORTED_FILE_MESSAGE));
                    String::new()
                }
                Err(FileRejection::Extraction(e)) => {
                    warn!(file_name = %file.file_name, "Text extraction failed: {}", e);
                    outcome.flashes.push(Flash::danger(e.to_string()));
                    return outcome;
                }
            },
            Submission::Empty => String::new(),
        };

        if input_text.trim().is_empty() {
            outcome.flashes.push(Flash::warning(NO_VALID_INPUT_MESSAGE));
            return outcome;
        }

        let started = Instant::now();
        let summary = self.summarizer.summarize(&input_text).await;
        match &summary {
            Ok(text) => info!(
                chars = text.chars().count(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Summary received"
            ),
            Err(e) => warn!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Summarization failed: {}", e
            ),
        }
        outcome.result = Some(summary);
        outcome
    }

    /// Validates, stores and extracts an uploaded file. The stored copy is
    /// removed before this returns.
    async fn text_from_file(&self, file: &UploadedFile) -> Result<String, FileRejection> {
        let kind = DocumentKind::from_filename(&file.file_name).ok_or(FileRejection::Unsupported)?;

        let stored = ScratchFile::persist(&self.upload_dir, &file.file_name, &file.bytes)
            .await
            .map_err(|e| FileRejection::Extraction(ExtractionError::Store(e)))?;
        info!(
            path = %stored.path().display(),
            kind = kind.label(),
            size = file.bytes.len(),
            "Upload stored, extracting text"
        );

        let extractor = match kind {
            DocumentKind::Pdf => &self.pdf,
            DocumentKind::Image => &self.ocr,
        };
        extractor
            .extract(stored.path())
            .await
            .map_err(FileRejection::Extraction)
    }
}

/// Why an upload produced no text.
enum FileRejection {
    Unsupported,
    Extraction(ExtractionError),
}
