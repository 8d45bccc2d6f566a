//! Rendering strategies and attachment retrieval
//!
//! External collaborators consumed by the orchestrator. The conversion algorithms
//! behind them are black boxes; only their contracts live here.

pub mod factory;
pub mod http;
pub mod template;

use crate::document::PagedDocument;
use crate::error::{AttachmentError, RenderError};
use crate::record::Record;
use crate::types::RecordId;
use async_trait::async_trait;
use bytes::Bytes;

pub use factory::{Strategies, StrategyFactory};
pub use http::{HttpAttachmentFetcher, HttpPrimaryRenderer};
pub use template::TemplateFallbackRenderer;

/// High-fidelity converter producing the filled form document
#[async_trait]
pub trait PrimaryRenderer: Send + Sync {
    /// Render the form for `record_id` and return the document bytes.
    ///
    /// Returns [`RenderError::ConverterUnavailable`] when the conversion engine is
    /// structurally absent; any other error is a hard failure.
    async fn render_primary(&self, record_id: &RecordId) -> Result<Bytes, RenderError>;

    /// Content type of the documents this renderer produces
    fn content_type(&self) -> &str {
        "application/pdf"
    }
}

/// Degraded, purely local renderer used when the primary strategy fails
#[async_trait]
pub trait FallbackRenderer: Send + Sync {
    async fn render_fallback(&self, record: &Record) -> Result<PagedDocument, RenderError>;
}

/// Bytes and reported content type of a retrieved attachment
#[derive(Debug, Clone)]
pub struct FetchedAttachment {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

/// Retrieves attachment bytes by retrieval reference
#[async_trait]
pub trait AttachmentFetcher: Send + Sync {
    async fn fetch_attachment(&self, reference: &str) -> Result<FetchedAttachment, AttachmentError>;
}
