//! Built-in 5x7 bitmap font for cluster count badges.
//!
//! Covers exactly what `abbreviate_count` emits: digits, `k` and `.`.

use image::{Rgba, RgbaImage};

pub const GLYPH_WIDTH: u32 = 5;
pub const GLYPH_HEIGHT: u32 = 7;
/// Blank columns between glyphs, before scaling.
const SPACING: u32 = 1;

/// Rows top to bottom; bit 4 is the leftmost column.
fn glyph(c: char) -> Option<[u8; 7]> {
    let rows = match c {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        'k' => [0x10, 0x10, 0x12, 0x14, 0x18, 0x14, 0x12],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        _ => return None,
    };
    Some(rows)
}

/// Unscaled pixel width of `text`.
pub fn text_width(text: &str) -> u32 {
    let glyphs = text.chars().filter(|&c| glyph(c).is_some()).count() as u32;
    if glyphs == 0 {
        0
    } else {
        glyphs * GLYPH_WIDTH + (glyphs - 1) * SPACING
    }
}

/// Largest integer scale at which `text` fits in `fraction` of the image width.
pub fn fit_scale(text: &str, image_width: u32, fraction: f32) -> u32 {
    let width = text_width(text);
    if width == 0 {
        return 1;
    }
    let available = (image_width as f32 * fraction) as u32;
    (available / width).max(1)
}

/// Draw `text` centred in `image` at an integer `scale`.
///
/// Pixels falling outside the image are clipped. Unknown characters are
/// skipped.
pub fn draw_centered(image: &mut RgbaImage, text: &str, scale: u32, color: Rgba<u8>) {
    let scale = scale.max(1);
    let text_w = (text_width(text) * scale) as i64;
    let text_h = (GLYPH_HEIGHT * scale) as i64;
    let origin_x = (i64::from(image.width()) - text_w) / 2;
    let origin_y = (i64::from(image.height()) - text_h) / 2;

    let mut pen_x = origin_x;
    for rows in text.chars().filter_map(glyph) {
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                    continue;
                }
                let x0 = pen_x + i64::from(col * scale);
                let y0 = origin_y + (row as i64) * i64::from(scale);
                fill_block(image, x0, y0, scale, color);
            }
        }
        pen_x += i64::from((GLYPH_WIDTH + SPACING) * scale);
    }
}

fn fill_block(image: &mut RgbaImage, x0: i64, y0: i64, size: u32, color: Rgba<u8>) {
    let (width, height) = (i64::from(image.width()), i64::from(image.height()));
    for y in y0..y0 + i64::from(size) {
        for x in x0..x0 + i64::from(size) {
            if (0..width).contains(&x) && (0..height).contains(&y) {
                image.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_width() {
        assert_eq!(text_width(""), 0);
        assert_eq!(text_width("7"), 5);
        assert_eq!(text_width("12"), 11);
        assert_eq!(text_width("1.5k"), 23);
        assert_eq!(text_width("a1"), 5);
    }

    #[test]
    fn test_fit_scale() {
        assert_eq!(fit_scale("12", 64, 0.6), 3);
        assert_eq!(fit_scale("9999", 16, 0.6), 1);
    }

    #[test]
    fn test_draw_marks_centre_only() {
        let white = Rgba([255, 255, 255, 255]);
        let mut image = RgbaImage::from_pixel(21, 21, Rgba([0, 0, 0, 255]));
        draw_centered(&mut image, "8", 3, white);

        // "8" has its top bar starting one column in from the left.
        let origin_x = (21 - 15) / 2;
        let origin_y = 0;
        assert_eq!(*image.get_pixel(origin_x + 3, origin_y), white);
        assert_eq!(*image.get_pixel(0, 20), Rgba([0, 0, 0, 255]));
        assert_eq!(*image.get_pixel(20, 0), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_draw_clips_oversized_text() {
        let mut image = RgbaImage::new(8, 8);
        draw_centered(&mut image, "8", 4, Rgba([255, 0, 0, 255]));
        assert!(image.pixels().any(|p| p[0] == 255));
    }
}
