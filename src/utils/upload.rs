use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Write;
use std::path::Path;
use tempfile::TempPath;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "png", "jpg", "jpeg", "heic", "heif"];

static UNSAFE_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_.-]").expect("valid filename regex"));

/// Which extractor an accepted upload is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Image,
}

impl DocumentKind {
    /// Classifies a client filename by its extension (the part after the last
    /// `.`, compared case-insensitively). `None` means the file is not accepted.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let extension = allowed_extension(filename)?;
        if extension == "pdf" {
            Some(Self::Pdf)
        } else {
            Some(Self::Image)
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Image => "image",
        }
    }
}

/// Lowercased extension of `filename` if it is in [`ALLOWED_EXTENSIONS`].
pub fn allowed_extension(filename: &str) -> Option<String> {
    let (_, extension) = filename.rsplit_once('.')?;
    let extension = extension.to_ascii_lowercase();
    ALLOWED_EXTENSIONS
        .contains(&extension.as_str())
        .then_some(extension)
}

/// Reduces a client supplied filename to something safe to join onto the
/// upload directory: ASCII only, no path components, no leading dots.
/// Accented letters keep their base letter (`é` becomes `e`).
pub fn sanitize_filename(filename: &str) -> String {
    let ascii: String = filename
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned = UNSAFE_FILENAME_CHARS.replace_all(&joined, "");
    let trimmed = cleaned.trim_matches(|c: char| c == '.' || c == '_');

    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}

/// An uploaded document written into the scratch directory for the lifetime
/// of one request. The file is removed when the value is dropped.
#[derive(Debug)]
pub struct ScratchFile {
    path: TempPath,
}

impl ScratchFile {
    /// Writes `bytes` under `<uuid>_<sanitized name>` inside `dir`.
    pub async fn persist(dir: &Path, client_name: &str, bytes: &[u8]) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(dir).await?;

        let dir = dir.to_path_buf();
        let prefix = format!("{}_", Uuid::new_v4().simple());
        let name = sanitize_filename(client_name);
        let bytes = bytes.to_vec();

        let path = tokio::task::spawn_blocking(move || -> std::io::Result<TempPath> {
            // The uuid prefix is the unique part, so no random suffix is needed
            let mut file = tempfile::Builder::new()
                .prefix(&prefix)
                .suffix(&name)
                .rand_bytes(0)
                .tempfile_in(&dir)?;
            file.write_all(&bytes)?;
            file.flush()?;
            debug!(path = %file.path().display(), size = bytes.len(), "Stored upload");
            Ok(file.into_temp_path())
        })
        .await
        .map_err(std::io::Error::other)??;

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_allowed_extensions_case_insensitively() {
        assert_eq!(DocumentKind::from_filename("bill.pdf"), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_filename("BILL.PDF"), Some(DocumentKind::Pdf));
        for name in ["a.png", "a.JPG", "a.jpeg", "a.heic", "a.HEIF", "x.tar.png"] {
            assert_eq!(DocumentKind::from_filename(name), Some(DocumentKind::Image), "{name}");
        }
    }

    #[test]
    fn rejects_other_or_missing_extensions() {
        for name in ["notes.txt", "archive.pdf.zip", "pdf", "", "image.", "scan.gif"] {
            assert_eq!(DocumentKind::from_filename(name), None, "{name}");
        }
    }

    #[test]
    fn sanitizes_path_components_and_unsafe_characters() {
        assert_eq!(sanitize_filename("My Bill.pdf"), "My_Bill.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(sanitize_filename(r"C:\Users\me\scan.png"), "C_Users_me_scan.png");
        assert_eq!(sanitize_filename("bill (final)!.pdf"), "bill_final.pdf");
        assert_eq!(sanitize_filename(".hidden.jpg"), "hidden.jpg");
        assert_eq!(sanitize_filename("résumé.pdf"), "resume.pdf");
        assert_eq!(sanitize_filename("Ünïcödé ﬁle.png"), "Unicode_file.png");
        assert_eq!(sanitize_filename("..."), "upload");
    }

    #[tokio::test]
    async fn scratch_file_is_unique_and_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();

        let first = ScratchFile::persist(dir.path(), "bill.pdf", b"one").await.unwrap();
        let second = ScratchFile::persist(dir.path(), "bill.pdf", b"two").await.unwrap();
        assert_ne!(first.path(), second.path());
        assert!(first.path().starts_with(dir.path()));
        assert!(first.path().to_string_lossy().ends_with("_bill.pdf"));
        assert_eq!(std::fs::read(first.path()).unwrap(), b"one");
        assert_eq!(std::fs::read(second.path()).unwrap(), b"two");

        let first_path = first.path().to_path_buf();
        drop(first);
        assert!(!first_path.exists());
        assert!(second.path().exists());
    }

    #[tokio::test]
    async fn creates_missing_upload_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("uploads");
        let file = ScratchFile::persist(&nested, "scan.png", b"png").await.unwrap();
        assert!(file.path().starts_with(&nested));
    }
}
