//! Local fallback renderer: the blank form template read from disk.

use crate::document::{count_pages, PageInspector, PagedDocument, SourceDocument};
use crate::error::RenderError;
use crate::record::Record;
use crate::render::FallbackRenderer;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Produces the unfilled form template as the degraded preview.
pub struct TemplateFallbackRenderer {
    template_path: PathBuf,
    inspector: Arc<dyn PageInspector>,
}

impl TemplateFallbackRenderer {
    pub fn new<P: AsRef<Path>>(template_path: P, inspector: Arc<dyn PageInspector>) -> Self {
        Self {
            template_path: template_path.as_ref().to_path_buf(),
            inspector,
        }
    }

    pub fn template_path(&self) -> &Path {
        &self.template_path
    }
}

#[async_trait]
impl FallbackRenderer for TemplateFallbackRenderer {
    async fn render_fallback(&self, record: &Record) -> Result<PagedDocument, RenderError> {
        debug!(
            record_id = %record.id,
            template = %self.template_path.display(),
            "Rendering fallback from template"
        );
        let bytes = tokio::fs::read(&self.template_path).await.map_err(|e| {
            RenderError::TemplateUnavailable(format!(
                "Failed to read {}: {}",
                self.template_path.display(),
                e
            ))
        })?;
        let bytes = Bytes::from(bytes);
        let page_count = count_pages(&self.inspector, bytes.clone())
            .await
            .map_err(|e| RenderError::InvalidDocument(e.to_string()))?;
        let source = SourceDocument::new(bytes, "application/pdf", page_count)
            .map_err(|e| RenderError::InvalidDocument(e.to_string()))?;
        Ok(PagedDocument::from_source(source))
    }
}
