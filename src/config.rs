//! Configuration System
//!
//! Layered configuration for the preview pipeline: page layout policy, converter
//! endpoints, fallback template, attachment policy and logging. Supports global and
//! workspace files with environment variable overrides, and validation that reports
//! every problem at once.

use crate::document::PageLayout;
use crate::error::PreviewError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// Page size and margin used when placing raster attachments
    #[serde(default)]
    pub page: PageLayout,

    /// High-fidelity converter
    #[serde(default)]
    pub primary: PrimaryConverterConfig,

    /// Degraded local renderer
    #[serde(default)]
    pub fallback: FallbackConfig,

    /// Attachment selection and retrieval
    #[serde(default)]
    pub attachments: AttachmentConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote converter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimaryConverterConfig {
    /// Endpoint URL; `{record_id}` is substituted
    #[serde(default = "default_primary_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_primary_timeout")]
    pub timeout_secs: u64,

    /// Case-insensitive substrings of an error body that mean the conversion engine
    /// is absent (recoverable; triggers the fallback)
    #[serde(default = "default_unavailable_markers")]
    pub unavailable_markers: Vec<String>,
}

fn default_primary_endpoint() -> String {
    "http://localhost:3000/forms/{record_id}/render".to_string()
}

fn default_primary_timeout() -> u64 {
    60
}

fn default_unavailable_markers() -> Vec<String> {
    vec![
        "engine not found".to_string(),
        "libreoffice not found".to_string(),
        "soffice not found".to_string(),
        "converter unavailable".to_string(),
    ]
}

impl Default for PrimaryConverterConfig {
    fn default() -> Self {
        Self {
            endpoint: default_primary_endpoint(),
            timeout_secs: default_primary_timeout(),
            unavailable_markers: default_unavailable_markers(),
        }
    }
}

/// Fallback renderer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// Blank form template rendered when the converter cannot be used
    #[serde(default = "default_template_path")]
    pub template_path: PathBuf,
}

fn default_template_path() -> PathBuf {
    PathBuf::from("templates/application-form.pdf")
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            template_path: default_template_path(),
        }
    }
}

/// Attachment selection and retrieval settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentConfig {
    /// File statuses that count as approved (case-insensitive)
    #[serde(default = "default_accepted_statuses")]
    pub accepted_statuses: Vec<String>,

    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

fn default_accepted_statuses() -> Vec<String> {
    vec!["approved".to_string()]
}

fn default_fetch_timeout() -> u64 {
    30
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            accepted_statuses: default_accepted_statuses(),
            fetch_timeout_secs: default_fetch_timeout(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Page(String),
    Primary(String),
    Fallback(String),
    Attachments(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Page(msg) => write!(f, "Page: {}", msg),
            ValidationError::Primary(msg) => write!(f, "Primary converter: {}", msg),
            ValidationError::Fallback(msg) => write!(f, "Fallback: {}", msg),
            ValidationError::Attachments(msg) => write!(f, "Attachments: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl PrimaryConverterConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(format!("Endpoint must be an http(s) URL: {}", self.endpoint));
        }
        if self.timeout_secs == 0 {
            return Err("Timeout must be at least one second".to_string());
        }
        Ok(())
    }
}

impl PreviewConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.page.validate() {
            errors.push(ValidationError::Page(e));
        }

        if let Err(e) = self.primary.validate() {
            errors.push(ValidationError::Primary(e));
        }

        if self.fallback.template_path.as_os_str().is_empty() {
            errors.push(ValidationError::Fallback(
                "Template path cannot be empty".to_string(),
            ));
        }

        if self.attachments.accepted_statuses.is_empty() {
            errors.push(ValidationError::Attachments(
                "At least one accepted status is required".to_string(),
            ));
        }
        if self.attachments.fetch_timeout_secs == 0 {
            errors.push(ValidationError::Attachments(
                "Fetch timeout must be at least one second".to_string(),
            ));
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            errors.push(ValidationError::Logging(format!(
                "Invalid log format: {}",
                self.logging.format
            )));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Load and validate configuration for `workspace_root`
    pub fn load_validated(workspace_root: &Path) -> Result<Self, PreviewError> {
        let config = ConfigLoader::load(workspace_root)?;
        config.into_validated()
    }

    /// Validate, folding all errors into one [`PreviewError::ConfigError`]
    pub fn into_validated(self) -> Result<Self, PreviewError> {
        self.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            PreviewError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;
        Ok(self)
    }
}
