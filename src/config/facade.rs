//! Configuration loading facade.

use super::merge::merge_policy;
use super::sources::{global_file, workspace_file};
use super::PreviewConfig;
use config::{ConfigError, Environment, File};
use std::path::{Path, PathBuf};

/// Loads [`PreviewConfig`] from layered sources.
///
/// Precedence (lowest to highest): built-in defaults, global config file, workspace
/// `config/config.toml`, workspace `config/{PERMIT_PREVIEW_ENV}.toml`, environment
/// variables `PERMIT_PREVIEW__SECTION__KEY`.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace root
    pub fn load(workspace_root: &Path) -> Result<PreviewConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = builder.add_source(
            Environment::with_prefix("PERMIT_PREVIEW")
                .separator("__")
                .try_parsing(true),
        );
        builder.build()?.try_deserialize()
    }

    /// Load configuration from a single file layered over defaults
    pub fn load_from_file(path: &Path) -> Result<PreviewConfig, ConfigError> {
        merge_policy::builder_with_defaults()?
            .add_source(File::from(path.to_path_buf()).required(true))
            .build()?
            .try_deserialize()
    }

    /// Path of the global (per-user) configuration file
    pub fn global_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }

    /// Built-in defaults only
    pub fn default() -> PreviewConfig {
        PreviewConfig::default()
    }
}
