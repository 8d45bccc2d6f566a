//! CLI domain: parse, route, export and output only.
//! No pipeline logic; the route table dispatches to the orchestrator.

mod export;
mod output;
mod parse;
mod route;

pub use export::{export_preview, ExportManifest, ManifestPage};
pub use output::map_error;
pub use parse::{Cli, Commands};
pub use route::RunContext;
