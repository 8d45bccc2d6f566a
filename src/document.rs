//! Page-bearing documents
//!
//! In-memory representation of the artifacts the pipeline produces. A document is an
//! ordered list of fixed-layout pages; pages are cheap to clone (their content is
//! reference counted), so merging never copies page payloads.

pub mod inspect;

use crate::error::DocumentError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use inspect::{count_pages, PageInspector, PdfPageInspector};

/// Page dimensions and printable margin, in PDF points (1/72 inch)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageLayout {
    pub width_pt: f32,
    pub height_pt: f32,
    pub margin_pt: f32,
}

impl PageLayout {
    /// ISO A4 portrait
    pub const A4: PageLayout = PageLayout {
        width_pt: 595.28,
        height_pt: 841.89,
        margin_pt: 36.0,
    };

    pub fn printable_width(&self) -> f32 {
        (self.width_pt - 2.0 * self.margin_pt).max(0.0)
    }

    pub fn printable_height(&self) -> f32 {
        (self.height_pt - 2.0 * self.margin_pt).max(0.0)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.width_pt > 0.0 && self.height_pt > 0.0) {
            return Err("Page width and height must be positive".to_string());
        }
        if self.margin_pt < 0.0 {
            return Err("Page margin cannot be negative".to_string());
        }
        if self.printable_width() <= 0.0 || self.printable_height() <= 0.0 {
            return Err(format!(
                "Margin {}pt leaves no printable area on a {}x{}pt page",
                self.margin_pt, self.width_pt, self.height_pt
            ));
        }
        Ok(())
    }
}

impl Default for PageLayout {
    fn default() -> Self {
        Self::A4
    }
}

/// Placement rectangle on a page, origin at the top-left corner, in points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// An externally produced paged document (e.g. PDF bytes) and its page count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    fingerprint: String,
    content_type: String,
    bytes: Bytes,
    page_count: usize,
}

impl SourceDocument {
    pub fn new(
        bytes: Bytes,
        content_type: impl Into<String>,
        page_count: usize,
    ) -> Result<Self, DocumentError> {
        if page_count == 0 {
            return Err(DocumentError::Empty);
        }
        let fingerprint = hex::encode(blake3::hash(&bytes).as_bytes());
        Ok(Self {
            fingerprint,
            content_type: content_type.into(),
            bytes,
            page_count,
        })
    }

    /// Content hash of the document bytes (hex BLAKE3)
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }
}

/// A raster image placed on a fixed-size page
#[derive(Debug, Clone, PartialEq)]
pub struct RasterPage {
    pub layout: PageLayout,
    pub placement: Placement,
    pub pixel_width: u32,
    pub pixel_height: u32,
    /// PNG-encoded image data
    pub png: Bytes,
}

/// One page of a page-bearing document
#[derive(Debug, Clone, PartialEq)]
pub enum Page {
    /// Page `index` (zero-based) of an external paged document
    Embedded {
        source: Arc<SourceDocument>,
        index: usize,
    },
    Raster(Arc<RasterPage>),
}

impl Page {
    /// Stable label for manifests and diagnostics
    pub fn label(&self) -> String {
        match self {
            Page::Embedded { source, index } => {
                format!("{}#{}", &source.fingerprint()[..12], index + 1)
            }
            Page::Raster(raster) => format!(
                "raster:{}x{}@{:.0}x{:.0}",
                raster.pixel_width, raster.pixel_height, raster.placement.width, raster.placement.height
            ),
        }
    }
}

/// Ordered, fixed-layout pages
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PagedDocument {
    pages: Vec<Page>,
}

impl PagedDocument {
    pub fn from_pages(pages: Vec<Page>) -> Self {
        Self { pages }
    }

    /// Every page of an external document, in order
    pub fn from_source(source: SourceDocument) -> Self {
        let source = Arc::new(source);
        let pages = (0..source.page_count())
            .map(|index| Page::Embedded {
                source: Arc::clone(&source),
                index,
            })
            .collect();
        Self { pages }
    }

    pub fn single_raster(page: RasterPage) -> Self {
        Self {
            pages: vec![Page::Raster(Arc::new(page))],
        }
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub(crate) fn extend_from(&mut self, other: &PagedDocument) {
        self.pages.extend(other.pages.iter().cloned());
    }
}
