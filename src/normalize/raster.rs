//! Placing raster images on fixed-size pages.

use crate::document::{PageLayout, Placement, RasterPage};
use crate::error::{AttachmentError, DocumentError};
use bytes::Bytes;
use image::{DynamicImage, ImageFormat};
use tracing::debug;

/// Largest aspect-preserving rectangle for a `width`x`height` image inside the
/// printable area of `layout`, centered on the page.
pub fn fit(layout: &PageLayout, width: u32, height: u32) -> Placement {
    let area_w = layout.printable_width();
    let area_h = layout.printable_height();
    if width == 0 || height == 0 {
        return Placement {
            x: layout.width_pt / 2.0,
            y: layout.height_pt / 2.0,
            width: 0.0,
            height: 0.0,
        };
    }

    let scale = (area_w / width as f32).min(area_h / height as f32);
    let placed_w = width as f32 * scale;
    let placed_h = height as f32 * scale;
    Placement {
        x: layout.margin_pt + (area_w - placed_w) / 2.0,
        y: layout.margin_pt + (area_h - placed_h) / 2.0,
        width: placed_w,
        height: placed_h,
    }
}

/// Decode an image, trusting `declared` first and sniffing the bytes if that fails.
pub fn decode(bytes: &[u8], declared: Option<ImageFormat>) -> Result<DynamicImage, AttachmentError> {
    if let Some(format) = declared {
        match image::load_from_memory_with_format(bytes, format) {
            Ok(img) => return Ok(img),
            Err(e) => debug!(
                declared = ?format,
                error = %e,
                "Declared image format failed to decode, sniffing"
            ),
        }
    }
    image::load_from_memory(bytes).map_err(|e| AttachmentError::DecodeFailed(e.to_string()))
}

/// Decode and place an image on one page of `layout`.
pub fn rasterize(
    bytes: &[u8],
    declared: Option<ImageFormat>,
    layout: &PageLayout,
) -> Result<RasterPage, AttachmentError> {
    let img = decode(bytes, declared)?;
    let (pixel_width, pixel_height) = (img.width(), img.height());

    let mut png = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| DocumentError::EncodeFailed(e.to_string()))?;

    Ok(RasterPage {
        layout: *layout,
        placement: fit(layout, pixel_width, pixel_height),
        pixel_width,
        pixel_height,
        png: Bytes::from(png),
    })
}
