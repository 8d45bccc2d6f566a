//! CLI route: single route table and run context.

use crate::cli::export::export_preview;
use crate::cli::parse::Commands;
use crate::config::{ConfigLoader, PreviewConfig};
use crate::error::PreviewError;
use crate::orchestrator::GenerationOrchestrator;
use crate::record::Record;
use crate::session::PreviewSession;
use crate::signature::signature;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Runtime context for CLI execution: workspace root and effective configuration.
pub struct RunContext {
    workspace_root: PathBuf,
    config: PreviewConfig,
}

impl RunContext {
    /// Load and validate configuration from `config_path` or the workspace layers.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, PreviewError> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        }
        .into_validated()?;
        Ok(Self {
            workspace_root,
            config,
        })
    }

    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }

    pub async fn execute(&self, command: &Commands) -> Result<String, PreviewError> {
        match command {
            Commands::Signature { record } => {
                let record = self.read_record(record)?;
                let signature = signature(Some(&record))
                    .ok_or_else(|| PreviewError::ConfigError("No record".to_string()))?;
                Ok(signature.to_string())
            }
            Commands::Preview { record, out } => {
                let record = self.read_record(record)?;
                self.preview(&record, out).await
            }
            Commands::Config => toml::to_string_pretty(&self.config).map_err(|e| {
                PreviewError::ConfigError(format!("Failed to render configuration: {}", e))
            }),
        }
    }

    async fn preview(&self, record: &Record, out: &Path) -> Result<String, PreviewError> {
        let mut config = self.config.clone();
        if config.fallback.template_path.is_relative() {
            config.fallback.template_path = self.workspace_root.join(&config.fallback.template_path);
        }

        let orchestrator = Arc::new(GenerationOrchestrator::from_config(&config)?);
        let session = PreviewSession::new(Arc::clone(&orchestrator));
        let outcome = session.request_preview(record).await?;
        let document = orchestrator.resolve(outcome.deliverable()).ok_or_else(|| {
            PreviewError::ExportFailed(format!("Handle {} is no longer live", outcome.deliverable()))
        })?;

        let manifest = export_preview(&outcome, &document, out)?;
        info!(
            record_id = %record.id,
            pages = manifest.pages.len(),
            out = %out.display(),
            "Preview exported"
        );

        let mut lines = Vec::new();
        if let Some(advisory) = &manifest.advisory {
            lines.push(format!("Note: {}", advisory));
        }
        lines.push(format!(
            "Exported {} page(s) for record {} ({}) to {}",
            manifest.pages.len(),
            manifest.record_id,
            manifest.source,
            out.display()
        ));

        session.close_preview();
        orchestrator.shutdown();
        Ok(lines.join("\n"))
    }

    fn read_record(&self, path: &Path) -> Result<Record, PreviewError> {
        let path = if path.is_relative() {
            self.workspace_root.join(path)
        } else {
            path.to_path_buf()
        };
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            PreviewError::ConfigError(format!("Failed to read record {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            PreviewError::ConfigError(format!("Invalid record {}: {}", path.display(), e))
        })
    }
}
