//! PDF text extraction via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! pdfium wraps a C++ library with thread-local state and CPU-bound parsing.
//! [`extract_text`] moves the work onto Tokio's blocking pool so the async
//! workers serving other requests never stall on a large deck.
//!
//! The extractor sits behind [`TextExtractor`] so the orchestrator can be
//! driven with canned text in tests.

use crate::error::AnalysisError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Turns a PDF on disk into UTF-8 text.
pub trait TextExtractor: Send + Sync {
    /// Extract the text of every page, pages separated by a blank line.
    ///
    /// Unreadable files and files with no extractable text fail with
    /// [`AnalysisError::Extraction`].
    fn extract_text(&self, path: &Path) -> Result<String, AnalysisError>;
}

/// Production extractor bound to the pdfium shared library.
///
/// The library is located (and on first use downloaded) by `pdfium-auto`.
#[derive(Debug, Clone, Default)]
pub struct PdfiumTextExtractor {
    password: Option<String>,
}

impl PdfiumTextExtractor {
    pub fn new(password: Option<String>) -> Self {
        Self { password }
    }
}

impl TextExtractor for PdfiumTextExtractor {
    fn extract_text(&self, path: &Path) -> Result<String, AnalysisError> {
        let extraction_err = |detail: String| AnalysisError::Extraction {
            path: path.to_path_buf(),
            detail,
        };

        let pdfium = pdfium_auto::bind_pdfium_silent()
            .map_err(|e| extraction_err(format!("pdfium unavailable: {e}")))?;

        let document = pdfium
            .load_pdf_from_file(path, self.password.as_deref())
            .map_err(|e| {
                let detail = format!("{e:?}");
                if detail.to_lowercase().contains("password") {
                    extraction_err("PDF is password-protected".to_string())
                } else {
                    extraction_err(detail)
                }
            })?;

        let pages = document.pages();
        info!("PDF loaded: {} pages", pages.len());

        let mut text = String::new();
        for (idx, page) in pages.iter().enumerate() {
            let page_text = page
                .text()
                .map_err(|e| extraction_err(format!("page {}: {e:?}", idx + 1)))?
                .all();
            debug!("Page {}: {} chars", idx + 1, page_text.len());
            if !text.is_empty() {
                text.push_str("\n\n");
            }
            text.push_str(page_text.trim_end());
        }

        ensure_text(path, text)
    }
}

/// Reject extraction results that hold no text (scanned decks).
pub(crate) fn ensure_text(path: &Path, text: String) -> Result<String, AnalysisError> {
    if text.trim().is_empty() {
        return Err(AnalysisError::Extraction {
            path: path.to_path_buf(),
            detail: "no extractable text (scanned or image-only PDF?)".to_string(),
        });
    }
    Ok(text)
}

/// Run `extractor` on the blocking pool.
pub async fn extract_text(
    extractor: Arc<dyn TextExtractor>,
    path: PathBuf,
) -> Result<String, AnalysisError> {
    tokio::task::spawn_blocking(move || extractor.extract_text(&path))
        .await
        .map_err(|e| AnalysisError::Internal(format!("Extraction task panicked: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned(&'static str);

    impl TextExtractor for Canned {
        fn extract_text(&self, path: &Path) -> Result<String, AnalysisError> {
            ensure_text(path, self.0.to_string())
        }
    }

    #[tokio::test]
    async fn blank_text_is_an_extraction_error() {
        let err = extract_text(Arc::new(Canned("  \n\n ")), PathBuf::from("deck.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Extraction { .. }), "{err:?}");
        assert!(err.to_string().contains("deck.pdf"));
    }

    #[tokio::test]
    async fn text_passes_through_blocking_pool() {
        let text = extract_text(Arc::new(Canned("Team: two founders")), PathBuf::from("a.pdf"))
            .await
            .unwrap();
        assert_eq!(text, "Team: two founders");
    }
}
