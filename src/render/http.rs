//! HTTP adapters: the remote form converter and attachment retrieval.

use crate::config::PrimaryConverterConfig;
use crate::error::{AttachmentError, RenderError};
use crate::render::{AttachmentFetcher, FetchedAttachment, PrimaryRenderer};
use crate::types::RecordId;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Remote high-fidelity converter.
///
/// POSTs `{"record_id": ...}` to the configured endpoint (`{record_id}` in the
/// endpoint is substituted) and expects the rendered document as the body.
pub struct HttpPrimaryRenderer {
    client: Client,
    endpoint: String,
    unavailable_markers: Vec<String>,
}

impl HttpPrimaryRenderer {
    pub fn new(config: &PrimaryConverterConfig) -> Result<Self, RenderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RenderError::RequestFailed(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            unavailable_markers: config
                .unavailable_markers
                .iter()
                .map(|m| m.to_lowercase())
                .collect(),
        })
    }

    fn url_for(&self, record_id: &RecordId) -> String {
        self.endpoint.replace("{record_id}", record_id.as_str())
    }

    /// Classify a failed converter response.
    fn classify_failure(&self, status: u16, body: &str) -> RenderError {
        if matches_unavailable(&self.unavailable_markers, body) {
            RenderError::ConverterUnavailable(truncate(body, 200))
        } else {
            RenderError::UnexpectedStatus {
                status,
                body: truncate(body, 200),
            }
        }
    }
}

/// Whether a converter error body carries one of the recognized unavailability markers.
pub(crate) fn matches_unavailable(markers: &[String], body: &str) -> bool {
    let body = body.to_lowercase();
    markers
        .iter()
        .any(|marker| !marker.is_empty() && body.contains(&marker.to_lowercase()))
}

fn truncate(value: &str, max_chars: usize) -> String {
    let trimmed = value.trim();
    if trimmed.chars().count() <= max_chars {
        trimmed.to_string()
    } else {
        let mut out: String = trimmed.chars().take(max_chars).collect();
        out.push('…');
        out
    }
}

#[async_trait]
impl PrimaryRenderer for HttpPrimaryRenderer {
    async fn render_primary(&self, record_id: &RecordId) -> Result<Bytes, RenderError> {
        let url = self.url_for(record_id);
        debug!(record_id = %record_id, url = %url, "Requesting primary render");

        let response = self
            .client
            .post(&url)
            .json(&json!({ "record_id": record_id.as_str() }))
            .send()
            .await
            .map_err(|e| RenderError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.classify_failure(status.as_u16(), &body));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RenderError::RequestFailed(format!("Failed to read body: {}", e)))?;
        if bytes.is_empty() {
            return Err(RenderError::InvalidDocument("empty response body".to_string()));
        }
        Ok(bytes)
    }
}

/// Fetches attachments by URL
pub struct HttpAttachmentFetcher {
    client: Client,
}

impl HttpAttachmentFetcher {
    pub fn new(timeout: Duration) -> Result<Self, AttachmentError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AttachmentError::FetchFailed(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl AttachmentFetcher for HttpAttachmentFetcher {
    async fn fetch_attachment(&self, reference: &str) -> Result<FetchedAttachment, AttachmentError> {
        let response = self
            .client
            .get(reference)
            .send()
            .await
            .map_err(|e| AttachmentError::FetchFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttachmentError::FetchFailed(format!(
                "GET {} returned {}",
                reference, status
            )));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AttachmentError::FetchFailed(format!("Failed to read body: {}", e)))?;

        Ok(FetchedAttachment {
            bytes,
            content_type,
        })
    }
}
