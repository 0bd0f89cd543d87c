//! Input resolution: turn a requested deck into a PDF path on disk.
//!
//! Remote decks are staged into a `TempDir` owned by [`ResolvedInput`]; the
//! file is removed when the value is dropped. The PDF magic bytes (`%PDF`)
//! are checked before pdfium ever sees the file.

use crate::error::AnalysisError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// A deck ready for text extraction.
#[derive(Debug)]
pub enum ResolvedInput {
    /// The deck already lives in a local folder.
    Local(PathBuf),
    /// The deck was fetched and staged in a temp dir.
    /// The `TempDir` keeps the file alive until this value is dropped.
    Staged { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Staged { path, .. } => path,
        }
    }

    pub fn is_staged(&self) -> bool {
        matches!(self, ResolvedInput::Staged { .. })
    }
}

/// Whether `bytes` start like a PDF. Files shorter than the magic are let
/// through for pdfium to judge.
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes.len() < PDF_MAGIC.len() || bytes.starts_with(PDF_MAGIC)
}

fn not_a_pdf(path: &Path, head: &[u8]) -> AnalysisError {
    AnalysisError::Extraction {
        path: path.to_path_buf(),
        detail: format!("not a PDF (starts with {:?})", String::from_utf8_lossy(head)),
    }
}

/// Validate a deck in a local folder.
///
/// `what` names the deck in the `NotFound` message (e.g. `upload 'a.pdf'`).
pub fn resolve_local(path: &Path, what: &str) -> Result<ResolvedInput, AnalysisError> {
    if !path.is_file() {
        return Err(AnalysisError::NotFound {
            what: what.to_string(),
        });
    }

    let mut file = std::fs::File::open(path).map_err(|e| AnalysisError::Extraction {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    let mut head = Vec::with_capacity(PDF_MAGIC.len());
    file.by_ref()
        .take(PDF_MAGIC.len() as u64)
        .read_to_end(&mut head)
        .map_err(|e| AnalysisError::Extraction {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
    if !looks_like_pdf(&head) {
        return Err(not_a_pdf(path, &head));
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path.to_path_buf()))
}

/// Write fetched deck bytes into a fresh temp dir.
pub async fn stage_bytes(filename: &str, bytes: &[u8]) -> Result<ResolvedInput, AnalysisError> {
    let temp_dir = TempDir::new().map_err(|e| AnalysisError::Internal(e.to_string()))?;
    let path = temp_dir.path().join(filename);

    if !looks_like_pdf(bytes) {
        return Err(not_a_pdf(&path, &bytes[..PDF_MAGIC.len()]));
    }

    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| AnalysisError::Internal(format!("Failed to write temp file: {e}")))?;

    debug!("Staged {} bytes at {}", bytes.len(), path.display());
    Ok(ResolvedInput::Staged {
        path,
        _temp_dir: temp_dir,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_check() {
        assert!(looks_like_pdf(b"%PDF-1.7\n..."));
        assert!(!looks_like_pdf(b"<html>"));
        assert!(looks_like_pdf(b"%P"));
    }

    #[test]
    fn missing_local_file_is_not_found() {
        let err = resolve_local(Path::new("/definitely/not/here.pdf"), "upload 'here.pdf'")
            .unwrap_err();
        assert_eq!(err.to_string(), "upload 'here.pdf' not found");
    }

    #[test]
    fn local_non_pdf_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.pdf");
        std::fs::write(&path, b"PK\x03\x04zip").unwrap();
        let err = resolve_local(&path, "fake.pdf").unwrap_err();
        assert!(matches!(err, AnalysisError::Extraction { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn staged_file_is_removed_on_drop() {
        let staged = stage_bytes("deck.pdf", b"%PDF-1.4 body").await.unwrap();
        let path = staged.path().to_path_buf();
        assert!(staged.is_staged());
        assert!(path.exists());
        drop(staged);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn staged_non_pdf_leaves_nothing_behind() {
        let err = stage_bytes("deck.pdf", b"<html>nope</html>").await.unwrap_err();
        assert!(err.to_string().contains("not a PDF"));
    }
}
