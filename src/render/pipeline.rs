//! CPU side of marker rendering: decode, resize, badge and encode.
//!
//! Everything here is synchronous and meant to run on a blocking worker.

use super::glyphs;
use crate::error::RenderFailure;
use crate::projector::abbreviate_count;
use bytes::Bytes;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{ExtendedColorType, ImageEncoder, Rgba};
use serde::{Deserialize, Serialize};

/// Share of the marker width the count label may occupy.
const LABEL_WIDTH_FRACTION: f32 = 0.6;
/// Share of the marker height the count label may occupy.
const LABEL_HEIGHT_FRACTION: f32 = 0.5;
const LABEL_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// What is drawn on top of the thumbnail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderKind {
    Point,
    /// Darkened thumbnail with the member count drawn on it.
    Cluster { member_count: usize },
}

/// An encoded PNG marker bitmap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedBitmap {
    pub bytes: Bytes,
    pub width: u32,
    pub height: u32,
}

/// Fixed compositing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSettings {
    pub cluster_brightness_delta: i32,
}

impl RenderSettings {
    pub fn from_config(config: &crate::Config) -> Self {
        Self {
            cluster_brightness_delta: config.cluster_brightness_delta,
        }
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self::from_config(&crate::Config::default())
    }
}

/// Turn raw encoded asset bytes into a marker bitmap.
pub fn render_bitmap(
    name: &str,
    raw: &[u8],
    kind: RenderKind,
    width: u32,
    height: u32,
    settings: RenderSettings,
) -> Result<RenderedBitmap, RenderFailure> {
    let decoded = image::load_from_memory(raw).map_err(|e| RenderFailure::Decode {
        name: name.to_string(),
        reason: e.to_string(),
    })?;

    let mut thumbnail = decoded.resize_to_fill(width, height, FilterType::Triangle);

    if let RenderKind::Cluster { member_count } = kind {
        thumbnail = thumbnail.brighten(settings.cluster_brightness_delta);
        let mut canvas = thumbnail.to_rgba8();
        draw_count(&mut canvas, member_count);
        thumbnail = canvas.into();
    }

    let pixels = thumbnail.to_rgba8();
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes)
        .write_image(&pixels, pixels.width(), pixels.height(), ExtendedColorType::Rgba8)
        .map_err(|e| RenderFailure::Encode(e.to_string()))?;

    Ok(RenderedBitmap {
        bytes: Bytes::from(bytes),
        width: pixels.width(),
        height: pixels.height(),
    })
}

fn draw_count(canvas: &mut image::RgbaImage, member_count: usize) {
    let label = abbreviate_count(member_count);
    let by_width = glyphs::fit_scale(&label, canvas.width(), LABEL_WIDTH_FRACTION);
    let by_height =
        ((canvas.height() as f32 * LABEL_HEIGHT_FRACTION) as u32 / glyphs::GLYPH_HEIGHT).max(1);
    glyphs::draw_centered(canvas, &label, by_width.min(by_height), LABEL_COLOR);
}
