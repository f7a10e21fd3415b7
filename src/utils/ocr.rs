use async_trait::async_trait;
use std::path::Path;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::extract::{ExtractionError, TextExtractor};

/// Optical character recognition through the `tesseract` command line tool.
///
/// The recognized text is returned exactly as tesseract prints it.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    command: String,
    lang: String,
}

impl TesseractOcr {
    pub fn new(command: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            lang: lang.into(),
        }
    }

    /// Returns true if the configured executable answers `--version`.
    pub async fn is_available(&self) -> bool {
        match Command::new(&self.command).arg("--version").output().await {
            Ok(output) => output.status.success(),
            Err(e) => {
                debug!(command = %self.command, "tesseract not runnable: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl TextExtractor for TesseractOcr {
    async fn extract(&self, path: &Path) -> Result<String, ExtractionError> {
        info!(path = %path.display(), lang = %self.lang, "Running OCR on image");
        let started = Instant::now();

        let output = Command::new(&self.command)
            .arg(path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.lang)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ExtractionError::Ocr(format!("failed to run {}: {}", self.command, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(path = %path.display(), status = %output.status, "tesseract failed");
            return Err(ExtractionError::Ocr(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        info!(
            path = %path.display(),
            chars = text.chars().count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "OCR complete"
        );
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_executable_is_an_ocr_error() {
        let ocr = TesseractOcr::new("definitely-not-tesseract-4f1c", "eng");
        assert!(!ocr.is_available().await);

        let err = ocr.extract(Path::new("scan.png")).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Ocr(_)));
        let message = err.to_string();
        assert!(message.starts_with("Image extraction error:"));
        assert!(message.contains("definitely-not-tesseract-4f1c"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_reports_stderr() {
        // `false` accepts any arguments and exits with status 1.
        let ocr = TesseractOcr::new("false", "eng");
        let err = ocr.extract(Path::new("scan.png")).await.unwrap_err();
        assert!(err.to_string().contains("exited with"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stdout_is_returned_verbatim() {
        // `echo` prints its arguments, standing in for the recognized text.
        let ocr = TesseractOcr::new("echo", "eng");
        let text = ocr.extract(Path::new("scan.png")).await.unwrap();
        assert_eq!(text, "scan.png stdout -l eng\n");
    }
}
