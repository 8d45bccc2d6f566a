//! Page counting for external paged documents.

use crate::error::DocumentError;
use bytes::Bytes;
use pdf_oxide::PdfDocument;
use std::io::Write;
use std::sync::Arc;

/// Reports how many pages an external paged document contains
pub trait PageInspector: Send + Sync {
    fn page_count(&self, bytes: &[u8]) -> Result<usize, DocumentError>;
}

/// Run `inspector` on the blocking pool.
///
/// Inspection writes a temp file and parses the whole document, so async callers go
/// through here instead of calling [`PageInspector::page_count`] directly.
pub async fn count_pages(
    inspector: &Arc<dyn PageInspector>,
    bytes: Bytes,
) -> Result<usize, DocumentError> {
    let inspector = Arc::clone(inspector);
    tokio::task::spawn_blocking(move || inspector.page_count(&bytes))
        .await
        .map_err(|e| DocumentError::Io(format!("page inspection task failed: {e}")))?
}

/// PDF page inspector backed by `pdf_oxide`
#[derive(Debug, Default)]
pub struct PdfPageInspector;

impl PdfPageInspector {
    pub fn new() -> Self {
        Self
    }
}

impl PageInspector for PdfPageInspector {
    fn page_count(&self, bytes: &[u8]) -> Result<usize, DocumentError> {
        if !bytes.starts_with(b"%PDF-") {
            return Err(DocumentError::OpenFailed(
                "missing %PDF- header".to_string(),
            ));
        }

        let mut temp_file = tempfile::NamedTempFile::new()
            .map_err(|e| DocumentError::Io(format!("failed to create temp file: {e}")))?;
        temp_file
            .write_all(bytes)
            .map_err(|e| DocumentError::Io(format!("failed to write temp file: {e}")))?;

        let mut doc = PdfDocument::open(temp_file.path())
            .map_err(|e| DocumentError::OpenFailed(format!("failed to parse PDF: {e}")))?;
        let pages = doc
            .page_count()
            .map_err(|e| DocumentError::OpenFailed(format!("failed to read page count: {e}")))?;

        if pages == 0 {
            return Err(DocumentError::Empty);
        }
        Ok(pages)
    }
}
