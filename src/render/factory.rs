use std::sync::Arc;
use std::time::Duration;

use crate::config::PreviewConfig;
use crate::document::{PageInspector, PdfPageInspector};
use crate::error::PreviewError;

use super::http::{HttpAttachmentFetcher, HttpPrimaryRenderer};
use super::template::TemplateFallbackRenderer;
use super::{AttachmentFetcher, FallbackRenderer, PrimaryRenderer};

/// The collaborators a [`GenerationOrchestrator`](crate::orchestrator::GenerationOrchestrator)
/// drives.
#[derive(Clone)]
pub struct Strategies {
    pub primary: Arc<dyn PrimaryRenderer>,
    pub fallback: Arc<dyn FallbackRenderer>,
    pub fetcher: Arc<dyn AttachmentFetcher>,
    pub inspector: Arc<dyn PageInspector>,
}

pub struct StrategyFactory;

impl StrategyFactory {
    /// Built-in adapters: HTTP converter and fetcher, on-disk template, PDF inspector.
    pub fn create(config: &PreviewConfig) -> Result<Strategies, PreviewError> {
        let inspector: Arc<dyn PageInspector> = Arc::new(PdfPageInspector::new());

        let primary = HttpPrimaryRenderer::new(&config.primary)
            .map_err(|e| PreviewError::ConfigError(e.to_string()))?;
        let fetcher =
            HttpAttachmentFetcher::new(Duration::from_secs(config.attachments.fetch_timeout_secs))
                .map_err(|e| PreviewError::ConfigError(e.to_string()))?;
        let fallback =
            TemplateFallbackRenderer::new(&config.fallback.template_path, Arc::clone(&inspector));

        Ok(Strategies {
            primary: Arc::new(primary),
            fallback: Arc::new(fallback),
            fetcher: Arc::new(fetcher),
            inspector,
        })
    }
}
