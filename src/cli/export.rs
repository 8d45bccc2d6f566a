//! Export of a delivered preview: a JSON page manifest plus page assets.
//!
//! Embedded pages reference their source document, written once per document;
//! raster pages are written as individual PNG files.

use crate::document::{Page, PagedDocument};
use crate::error::PreviewError;
use crate::orchestrator::{PreviewOutcome, PreviewSource};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportManifest {
    pub record_id: String,
    pub signature: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advisory: Option<String>,
    pub composite: bool,
    pub pages: Vec<ManifestPage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ManifestPage {
    Embedded {
        asset: String,
        /// One-based page number within the asset
        page: usize,
    },
    Raster {
        asset: String,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        page_width: f32,
        page_height: f32,
    },
}

fn source_label(source: PreviewSource) -> &'static str {
    match source {
        PreviewSource::Cached => "cached",
        PreviewSource::Resumed => "resumed",
        PreviewSource::Primary => "primary",
        PreviewSource::Fallback => "fallback",
    }
}

/// Write `document` (the deliverable of `outcome`) into `out_dir`.
pub fn export_preview(
    outcome: &PreviewOutcome,
    document: &PagedDocument,
    out_dir: &Path,
) -> Result<ExportManifest, PreviewError> {
    std::fs::create_dir_all(out_dir).map_err(|e| {
        PreviewError::ExportFailed(format!("Failed to create {}: {}", out_dir.display(), e))
    })?;

    let mut written = HashSet::new();
    let mut pages = Vec::with_capacity(document.page_count());
    for (n, page) in document.pages().iter().enumerate() {
        match page {
            Page::Embedded { source, index } => {
                let asset = format!("source-{}.pdf", &source.fingerprint()[..16]);
                if written.insert(asset.clone()) {
                    write_asset(out_dir, &asset, source.bytes())?;
                }
                pages.push(ManifestPage::Embedded {
                    asset,
                    page: index + 1,
                });
            }
            Page::Raster(raster) => {
                let asset = format!("page-{:03}.png", n + 1);
                write_asset(out_dir, &asset, &raster.png)?;
                pages.push(ManifestPage::Raster {
                    asset,
                    x: raster.placement.x,
                    y: raster.placement.y,
                    width: raster.placement.width,
                    height: raster.placement.height,
                    page_width: raster.layout.width_pt,
                    page_height: raster.layout.height_pt,
                });
            }
        }
    }

    let manifest = ExportManifest {
        record_id: outcome.record_id.to_string(),
        signature: outcome.signature.to_string(),
        source: source_label(outcome.source).to_string(),
        advisory: outcome.advisory.as_ref().map(|a| a.message()),
        composite: outcome.composite.is_some(),
        pages,
    };
    let json = serde_json::to_string_pretty(&manifest)
        .map_err(|e| PreviewError::ExportFailed(format!("Failed to serialize manifest: {}", e)))?;
    write_asset(out_dir, MANIFEST_FILE, json.as_bytes())?;
    Ok(manifest)
}

fn write_asset(out_dir: &Path, name: &str, bytes: &[u8]) -> Result<(), PreviewError> {
    let path = out_dir.join(name);
    std::fs::write(&path, bytes)
        .map_err(|e| PreviewError::ExportFailed(format!("Failed to write {}: {}", path.display(), e)))
}
