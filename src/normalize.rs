//! Attachment Normalizer
//!
//! Turns approved attachment files into page-bearing documents. Paged documents pass
//! through; raster images are placed on a page of the configured layout. Every
//! per-file failure is logged and the file is skipped, so normalization always yields
//! a (possibly partial) result in record order.

pub mod raster;

use crate::cancellation::CancellationToken;
use crate::document::{count_pages, PageInspector, PageLayout, PagedDocument, SourceDocument};
use crate::error::AttachmentError;
use crate::record::AttachmentFile;
use crate::render::{AttachmentFetcher, FetchedAttachment};
use futures::future::join_all;
use image::ImageFormat;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const PDF_MIME: &str = "application/pdf";
const OCTET_STREAM: &str = "application/octet-stream";

/// An attachment converted to pages
#[derive(Debug, Clone)]
pub struct NormalizedAttachment {
    pub file_id: String,
    pub name: String,
    pub document: PagedDocument,
}

/// How an attachment's bytes will be converted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentKind {
    Paged,
    /// Raster image; the format is what the content type claims, if recognized
    Raster(Option<ImageFormat>),
    Unsupported(String),
}

/// Classify an attachment by its content type, sniffing the bytes when the type is
/// missing or generic.
pub fn classify(content_type: Option<&str>, bytes: &[u8]) -> ContentKind {
    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty());

    match mime.as_deref() {
        Some(PDF_MIME) => ContentKind::Paged,
        Some(ct) if ct.starts_with("image/") => {
            ContentKind::Raster(ImageFormat::from_mime_type(ct))
        }
        None | Some(OCTET_STREAM) => sniff(bytes)
            .unwrap_or_else(|| ContentKind::Unsupported(mime.unwrap_or_default())),
        Some(other) => ContentKind::Unsupported(other.to_string()),
    }
}

fn sniff(bytes: &[u8]) -> Option<ContentKind> {
    if bytes.starts_with(b"%PDF-") {
        return Some(ContentKind::Paged);
    }
    image::guess_format(bytes)
        .ok()
        .map(|format| ContentKind::Raster(Some(format)))
}

pub struct AttachmentNormalizer {
    fetcher: Arc<dyn AttachmentFetcher>,
    inspector: Arc<dyn PageInspector>,
    layout: PageLayout,
    fetch_timeout: Duration,
}

impl AttachmentNormalizer {
    pub fn new(
        fetcher: Arc<dyn AttachmentFetcher>,
        inspector: Arc<dyn PageInspector>,
        layout: PageLayout,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            inspector,
            layout,
            fetch_timeout,
        }
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    /// Normalize `files` concurrently, preserving their order.
    ///
    /// Files that fail, and every file still pending when `token` is cancelled, are
    /// omitted from the result.
    pub async fn normalize(
        &self,
        files: &[&AttachmentFile],
        token: &CancellationToken,
    ) -> Vec<NormalizedAttachment> {
        let pending = files.iter().map(|file| async move {
            match token.run_until_cancelled(self.normalize_one(file)).await {
                Some(Ok(normalized)) => Some(normalized),
                Some(Err(e)) => {
                    warn!(
                        file_id = %file.id,
                        name = %file.name,
                        error = %e,
                        "Skipping attachment"
                    );
                    None
                }
                None => {
                    debug!(file_id = %file.id, "Attachment normalization cancelled");
                    None
                }
            }
        });

        join_all(pending).await.into_iter().flatten().collect()
    }

    async fn normalize_one(
        &self,
        file: &AttachmentFile,
    ) -> Result<NormalizedAttachment, AttachmentError> {
        let fetched = tokio::time::timeout(
            self.fetch_timeout,
            self.fetcher.fetch_attachment(&file.reference),
        )
        .await
        .map_err(|_| AttachmentError::Timeout(self.fetch_timeout))??;

        let document = self.convert(file, fetched).await?;
        debug!(
            file_id = %file.id,
            pages = document.page_count(),
            "Normalized attachment"
        );
        Ok(NormalizedAttachment {
            file_id: file.id.clone(),
            name: file.name.clone(),
            document,
        })
    }

    /// Convert fetched bytes into pages.
    ///
    /// The fetched content type wins; the type recorded on the file is used when the
    /// fetch reported none.
    pub async fn convert(
        &self,
        file: &AttachmentFile,
        fetched: FetchedAttachment,
    ) -> Result<PagedDocument, AttachmentError> {
        let content_type = fetched
            .content_type
            .as_deref()
            .or(file.content_type.as_deref());

        match classify(content_type, &fetched.bytes) {
            ContentKind::Paged => {
                let pages = count_pages(&self.inspector, fetched.bytes.clone()).await?;
                let source = SourceDocument::new(fetched.bytes, PDF_MIME, pages)?;
                Ok(PagedDocument::from_source(source))
            }
            ContentKind::Raster(format) => {
                let page = raster::rasterize(&fetched.bytes, format, &self.layout)?;
                Ok(PagedDocument::single_raster(page))
            }
            ContentKind::Unsupported(ct) => Err(AttachmentError::UnsupportedContentType(
                if ct.is_empty() { "unknown".to_string() } else { ct },
            )),
        }
    }
}
