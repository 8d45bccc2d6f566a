//! Error types for the permit preview pipeline.

use crate::types::RecordId;
use thiserror::Error;

/// Failures of a whole-document rendering strategy (primary converter or fallback)
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    /// The high-fidelity converter is absent or misconfigured. Triggers the fallback.
    #[error("Converter unavailable: {0}")]
    ConverterUnavailable(String),

    #[error("Render request failed: {0}")]
    RequestFailed(String),

    #[error("Converter returned status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Rendered document is invalid: {0}")]
    InvalidDocument(String),

    #[error("Fallback template unavailable: {0}")]
    TemplateUnavailable(String),
}

impl RenderError {
    /// Whether this failure is the recognized "engine unavailable" class.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RenderError::ConverterUnavailable(_))
    }
}

/// Failures local to a single attachment. Always absorbed by the normalizer.
#[derive(Debug, Clone, Error)]
pub enum AttachmentError {
    #[error("Attachment fetch failed: {0}")]
    FetchFailed(String),

    #[error("Attachment fetch timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("Attachment decode failed: {0}")]
    DecodeFailed(String),

    #[error("Attachment document invalid: {0}")]
    Document(#[from] DocumentError),
}

/// Page-bearing document construction errors
#[derive(Debug, Clone, Error)]
pub enum DocumentError {
    #[error("Failed to open document: {0}")]
    OpenFailed(String),

    #[error("Document has no pages")]
    Empty,

    #[error("Failed to encode page image: {0}")]
    EncodeFailed(String),

    #[error("Document I/O error: {0}")]
    Io(String),
}

/// Errors surfaced to callers of the preview API
#[derive(Debug, Error)]
pub enum PreviewError {
    /// Both strategies failed. Not retried automatically.
    #[error("Unable to produce preview for record {record_id}: primary: {primary}; fallback: {fallback}")]
    GenerationFailed {
        record_id: RecordId,
        primary: RenderError,
        fallback: RenderError,
    },

    /// The request was cancelled or superseded. Never shown to users.
    #[error("Preview request cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Export failed: {0}")]
    ExportFailed(String),
}

impl PreviewError {
    /// Cancellation is suppressed from all user-visible reporting.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, PreviewError::Cancelled)
    }
}

impl From<config::ConfigError> for PreviewError {
    fn from(err: config::ConfigError) -> Self {
        PreviewError::ConfigError(err.to_string())
    }
}
