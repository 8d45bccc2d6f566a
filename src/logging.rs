//! Logging System
//!
//! Structured logging using the `tracing` crate: configurable levels, per-module
//! directives, text or JSON output, stdout or file destinations.
//!
//! Priority order (highest to lowest):
//! 1. Environment variables (PERMIT_PREVIEW_LOG, PERMIT_PREVIEW_LOG_FORMAT, ...)
//! 2. Configuration file
//! 3. Defaults

use crate::error::PreviewError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

const ENV_FILTER: &str = "PERMIT_PREVIEW_LOG";
const ENV_FORMAT: &str = "PERMIT_PREVIEW_LOG_FORMAT";
const ENV_OUTPUT: &str = "PERMIT_PREVIEW_LOG_OUTPUT";
const ENV_MODULES: &str = "PERMIT_PREVIEW_LOG_MODULES";

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json, text
    #[serde(default = "default_format")]
    pub format: String,

    /// Output destination: stdout, file
    #[serde(default = "default_output")]
    pub output: String,

    /// Log file path (when output is "file")
    #[serde(default = "default_log_file")]
    pub file: PathBuf,

    /// Colored output (text format on stdout only)
    #[serde(default = "default_true")]
    pub color: bool,

    /// Module-specific log levels, e.g. `permit_preview::orchestrator = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "stdout".to_string()
}

fn default_log_file() -> PathBuf {
    directories::ProjectDirs::from("", "", "permit-preview")
        .map(|dirs| dirs.data_dir().join("preview.log"))
        .unwrap_or_else(|| PathBuf::from(".permit-preview/preview.log"))
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: default_log_file(),
            color: default_true(),
            modules: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = PreviewError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(PreviewError::ConfigError(format!(
                "Invalid log format: {} (must be 'json' or 'text')",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogOutput {
    Stdout,
    File,
}

impl FromStr for LogOutput {
    type Err = PreviewError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "stdout" => Ok(LogOutput::Stdout),
            "file" => Ok(LogOutput::File),
            other => Err(PreviewError::ConfigError(format!(
                "Invalid log output: {} (must be 'stdout' or 'file')",
                other
            ))),
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// Calling this more than once is harmless: later calls leave the first subscriber
/// in place.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), PreviewError> {
    let defaults = LoggingConfig::default();
    let config = config.unwrap_or(&defaults);

    let filter = build_env_filter(config)?;
    let format = std::env::var(ENV_FORMAT)
        .ok()
        .unwrap_or_else(|| config.format.clone())
        .parse::<LogFormat>()?;
    let output = std::env::var(ENV_OUTPUT)
        .ok()
        .unwrap_or_else(|| config.output.clone())
        .parse::<LogOutput>()?;

    let registry = Registry::default().with(filter);
    let timer = ChronoUtc::rfc_3339();

    // Already-initialized is not an error for callers
    let _ = match (format, output) {
        (LogFormat::Json, LogOutput::Stdout) => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(timer)
                    .with_writer(std::io::stdout),
            )
            .try_init(),
        (LogFormat::Json, LogOutput::File) => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(timer)
                    .with_writer(open_log_file(config)?),
            )
            .try_init(),
        (LogFormat::Text, LogOutput::Stdout) => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(timer)
                    .with_ansi(config.color)
                    .with_writer(std::io::stdout),
            )
            .try_init(),
        (LogFormat::Text, LogOutput::File) => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(timer)
                    .with_ansi(false)
                    .with_writer(open_log_file(config)?),
            )
            .try_init(),
    };

    Ok(())
}

fn open_log_file(config: &LoggingConfig) -> Result<std::fs::File, PreviewError> {
    if let Some(parent) = config.file.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            PreviewError::ConfigError(format!("Failed to create log directory: {}", e))
        })?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.file)
        .map_err(|e| {
            PreviewError::ConfigError(format!(
                "Failed to open log file {}: {}",
                config.file.display(),
                e
            ))
        })
}

/// Build the level filter: `PERMIT_PREVIEW_LOG` if set, otherwise config level plus
/// module directives from config and `PERMIT_PREVIEW_LOG_MODULES`.
fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter, PreviewError> {
    if let Ok(filter) = EnvFilter::try_from_env(ENV_FILTER) {
        return Ok(filter);
    }

    if config.level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut directives: Vec<String> = config
        .modules
        .iter()
        .map(|(module, level)| format!("{}={}", module, level))
        .collect();
    if let Ok(modules) = std::env::var(ENV_MODULES) {
        directives.extend(parse_module_directives(&modules));
    }

    let mut filter = EnvFilter::new(&config.level);
    for directive in directives {
        filter = filter.add_directive(directive.parse().map_err(|e| {
            PreviewError::ConfigError(format!("Invalid log directive '{}': {}", directive, e))
        })?);
    }
    Ok(filter)
}

/// Parse `module=level,module=level`; malformed pairs are skipped.
fn parse_module_directives(value: &str) -> Vec<String> {
    value
        .split(',')
        .filter_map(|pair| {
            let (module, level) = pair.split_once('=')?;
            let (module, level) = (module.trim(), level.trim());
            if module.is_empty() || level.is_empty() {
                None
            } else {
                Some(format!("{}={}", module, level))
            }
        })
        .collect()
}
