//! CLI output: error mapping from pipeline errors to the CLI surface.

use crate::error::PreviewError;

/// Map pipeline errors to a string for CLI output.
pub fn map_error(e: &PreviewError) -> String {
    match e {
        PreviewError::GenerationFailed { record_id, .. } => {
            format!("Unable to produce preview for record {}: {}", record_id, e)
        }
        other => other.to_string(),
    }
}
