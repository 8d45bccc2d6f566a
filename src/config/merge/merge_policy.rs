//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
///
/// Later sources override earlier ones key by key; tables are merged, lists are replaced.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("primary.endpoint", "http://localhost:3000/forms/{record_id}/render")?
        .set_default("primary.timeout_secs", 60)?
        .set_default("fallback.template_path", "templates/application-form.pdf")?
        .set_default("attachments.fetch_timeout_secs", 30)
}
