//! Permit Preview: Document Preview & Composition Pipeline
//!
//! Produces a single previewable artifact for a permit application record: the
//! rendered form followed by the record's approved attachments. Generation is gated by
//! a signature of the record's cache-relevant fields, falls back to a local renderer
//! when the converter is unavailable, and tracks every ephemeral output so nothing
//! leaks and nothing still cached is released.

pub mod cache;
pub mod cancellation;
pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod merge;
pub mod normalize;
pub mod orchestrator;
pub mod record;
pub mod render;
pub mod session;
pub mod signature;
pub mod types;

pub use cancellation::CancellationToken;
pub use error::PreviewError;
pub use orchestrator::{GenerationOrchestrator, PreviewOutcome, PreviewSource};
pub use record::Record;
pub use session::PreviewSession;
pub use signature::{signature, Signature};
