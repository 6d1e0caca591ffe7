/// Drawing primitives for frame overlays: bitmap text, boxes, corner
/// brackets and translucent panels. Every primitive clips to the image.
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

pub const GLYPH_WIDTH: i32 = 5;
pub const GLYPH_HEIGHT: i32 = 7;

/// Fallback glyph for characters missing from the font
const UNKNOWN_GLYPH: [u8; 7] = [
    0b11111, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11111,
];

/// 5x7 bitmap font, one row per byte, most significant of the low 5 bits on the left
const GLYPHS: &[(char, [u8; 7])] = &[
    ('A', [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001]),
    ('B', [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110]),
    ('C', [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110]),
    ('D', [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110]),
    ('E', [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111]),
    ('F', [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000]),
    ('G', [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111]),
    ('H', [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001]),
    ('I', [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110]),
    ('J', [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100]),
    ('K', [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001]),
    ('L', [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111]),
    ('M', [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001]),
    ('N', [0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001, 0b10001]),
    ('O', [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110]),
    ('P', [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000]),
    ('Q', [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101]),
    ('R', [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001]),
    ('S', [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110]),
    ('T', [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100]),
    ('U', [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110]),
    ('V', [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100]),
    ('W', [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b11011, 0b10001]),
    ('X', [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001]),
    ('Y', [0b10001, 0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100]),
    ('Z', [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111]),
    ('0', [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110]),
    ('1', [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110]),
    ('2', [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111]),
    ('3', [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110]),
    ('4', [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010]),
    ('5', [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110]),
    ('6', [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110]),
    ('7', [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000]),
    ('8', [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110]),
    ('9', [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100]),
    ('%', [0b11001, 0b11010, 0b00010, 0b00100, 0b01000, 0b01011, 0b10011]),
    (' ', [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b00000]),
    ('_', [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b11111]),
    ('-', [0b00000, 0b00000, 0b00000, 0b11111, 0b00000, 0b00000, 0b00000]),
    ('.', [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b01100]),
    (':', [0b00000, 0b01100, 0b01100, 0b00000, 0b01100, 0b01100, 0b00000]),
    ('#', [0b01010, 0b01010, 0b11111, 0b01010, 0b11111, 0b01010, 0b01010]),
];

fn glyph(ch: char) -> [u8; 7] {
    GLYPHS
        .iter()
        .find(|(c, _)| *c == ch)
        .map(|(_, rows)| *rows)
        .unwrap_or(UNKNOWN_GLYPH)
}

/// Pull a coordinate into a band `pad` pixels beyond the image edges
///
/// Edges moved this way stay outside the visible area, so clipped outlines
/// render the same while the arithmetic on them cannot overflow.
#[inline]
fn clip_coord(value: i32, limit: u32, pad: i32) -> i32 {
    let limit = i32::try_from(limit).unwrap_or(i32::MAX - pad);
    value.clamp(-pad, limit.saturating_add(pad))
}

#[inline]
fn put_clipped(img: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}

/// Size in pixels of a text block drawn with `draw_text`, including the 1px padding
pub fn text_size(text: &str, scale: u32) -> (u32, u32) {
    let scale = scale.max(1);
    let chars = text.chars().count() as u32;
    (
        chars * GLYPH_WIDTH as u32 * scale + 2,
        GLYPH_HEIGHT as u32 * scale + 2,
    )
}

/// Draw text using the 5x7 bitmap font (rendered uppercase)
///
/// # Arguments
/// * `img` - The image to draw on
/// * `text` - The text to draw
/// * `x`, `y` - Top-left corner of the text block
/// * `color` - Text color
/// * `bg_color` - Optional filled background behind the text
/// * `scale` - Integer pixel scale of each glyph dot
pub fn draw_text(
    img: &mut RgbImage,
    text: &str,
    x: i32,
    y: i32,
    color: Rgb<u8>,
    bg_color: Option<Rgb<u8>>,
    scale: u32,
) {
    let scale = scale.max(1) as i32;
    // Text grows right and down from its corner
    if x >= img.width() as i32 || y >= img.height() as i32 {
        return;
    }

    if let Some(bg) = bg_color {
        let (w, h) = text_size(text, scale as u32);
        fill_rect(img, x, y, w, h, bg);
    }

    let advance = GLYPH_WIDTH * scale;
    for (i, ch) in text.to_uppercase().chars().enumerate() {
        let origin_x = x.saturating_add(1).saturating_add(i as i32 * advance);
        let origin_y = y.saturating_add(1);
        if origin_x >= img.width() as i32 {
            break;
        }

        for (row, &bits) in glyph(ch).iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if (bits >> (GLYPH_WIDTH - 1 - col)) & 1 == 0 {
                    continue;
                }
                let px = origin_x + col * scale;
                let py = origin_y + row as i32 * scale;
                for dy in 0..scale {
                    for dx in 0..scale {
                        put_clipped(img, px + dx, py + dy, color);
                    }
                }
            }
        }
    }
}

/// Filled rectangle clipped to the image
pub fn fill_rect(img: &mut RgbImage, x: i32, y: i32, width: u32, height: u32, color: Rgb<u8>) {
    let x_end = x as i64 + width as i64;
    let y_end = y as i64 + height as i64;
    if width == 0 || height == 0 || x_end <= 0 || y_end <= 0 {
        return;
    }
    if x >= img.width() as i32 || y >= img.height() as i32 {
        return;
    }
    // Only the visible part, so the corner arithmetic stays within i32
    let x0 = x.max(0);
    let y0 = y.max(0);
    let w = (x_end.min(img.width() as i64) - x0 as i64) as u32;
    let h = (y_end.min(img.height() as i64) - y0 as i64) as u32;
    draw_filled_rect_mut(img, Rect::at(x0, y0).of_size(w, h), color);
}

/// Draw a rectangle outline between two corners, growing outward with thickness
///
/// Boxes partly outside the image are clipped; degenerate boxes draw nothing.
pub fn draw_rect(
    img: &mut RgbImage,
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
    color: Rgb<u8>,
    thickness: i32,
) {
    let thickness = thickness.max(1);
    if x2 <= x1 || y2 <= y1 {
        return;
    }
    let pad = thickness.saturating_add(1);
    let (x1, x2) = (clip_coord(x1, img.width(), pad), clip_coord(x2, img.width(), pad));
    let (y1, y2) = (clip_coord(y1, img.height(), pad), clip_coord(y2, img.height(), pad));
    if x2 <= x1 || y2 <= y1 {
        return;
    }
    let width = (x2 - x1) as u32;
    let height = (y2 - y1) as u32;

    for offset in 0..thickness {
        let rect = Rect::at(x1 - offset, y1 - offset)
            .of_size(width + 2 * offset as u32, height + 2 * offset as u32);
        draw_hollow_rect_mut(img, rect, color);
    }
}

/// Corner-bracket box: a thin outline with short thick brackets on each corner
#[allow(clippy::too_many_arguments)]
pub fn draw_corner_rect(
    img: &mut RgbImage,
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
    rect_color: Rgb<u8>,
    corner_color: Rgb<u8>,
    length: i32,
    thickness: i32,
) {
    if x2 <= x1 || y2 <= y1 {
        return;
    }
    let length = length.max(1);
    let t = thickness.max(1);
    let half = t / 2;

    let pad = length.saturating_add(t).saturating_add(1);
    let (x1, x2) = (clip_coord(x1, img.width(), pad), clip_coord(x2, img.width(), pad));
    let (y1, y2) = (clip_coord(y1, img.height(), pad), clip_coord(y2, img.height(), pad));
    if x2 <= x1 || y2 <= y1 {
        return;
    }
    draw_rect(img, x1, y1, x2, y2, rect_color, 1);

    // (corner x, corner y, horizontal direction, vertical direction)
    let corners = [(x1, y1, 1, 1), (x2, y1, -1, 1), (x1, y2, 1, -1), (x2, y2, -1, -1)];
    for (cx, cy, dx, dy) in corners {
        let hx = if dx > 0 { cx } else { cx - length };
        fill_rect(img, hx, cy - half, length as u32, t as u32, corner_color);

        let vy = if dy > 0 { cy } else { cy - length };
        fill_rect(img, cx - half, vy, t as u32, length as u32, corner_color);
    }
}

/// Blend a solid color over a region: `alpha * color + (1 - alpha) * pixel`
pub fn blend_rect(
    img: &mut RgbImage,
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    color: Rgb<u8>,
    alpha: f32,
) {
    let alpha = alpha.clamp(0.0, 1.0);
    let x_start = x.max(0) as u32;
    let y_start = y.max(0) as u32;
    let x_end = (x as i64 + width as i64).clamp(0, img.width() as i64) as u32;
    let y_end = (y as i64 + height as i64).clamp(0, img.height() as i64) as u32;

    for py in y_start..y_end {
        for px in x_start..x_end {
            let pixel = img.get_pixel_mut(px, py);
            for c in 0..3 {
                let blended = alpha * color[c] as f32 + (1.0 - alpha) * pixel[c] as f32;
                pixel[c] = blended.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgb<u8> = Rgb([255, 0, 0]);

    #[test]
    fn test_text_size() {
        assert_eq!(text_size("AB", 1), (12, 9));
        assert_eq!(text_size("AB", 2), (22, 16));
        assert_eq!(text_size("", 3), (2, 23));
    }

    #[test]
    fn test_draw_text_with_background() {
        let mut img = RgbImage::new(40, 20);
        draw_text(&mut img, "i", 0, 0, RED, Some(Rgb([0, 0, 255])), 1);

        // Background pixel in the padding
        assert_eq!(*img.get_pixel(0, 0), Rgb([0, 0, 255]));
        // Top row of 'I' glyph is 0b01110, lowercase input is uppercased
        assert_eq!(*img.get_pixel(2, 1), RED);
        assert_eq!(*img.get_pixel(1, 1), Rgb([0, 0, 255]));
        // Outside the text block untouched
        assert_eq!(*img.get_pixel(30, 15), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_draw_text_clips() {
        let mut img = RgbImage::new(8, 8);
        draw_text(&mut img, "PEOPLE COUNT: 12", -20, -3, RED, Some(RED), 2);
        draw_text(&mut img, "X", 100, 100, RED, None, 1);
    }

    #[test]
    fn test_draw_rect_thickness() {
        let mut img = RgbImage::new(30, 30);
        draw_rect(&mut img, 10, 10, 20, 20, RED, 2);

        assert_eq!(*img.get_pixel(10, 10), RED);
        assert_eq!(*img.get_pixel(9, 9), RED);
        assert_eq!(*img.get_pixel(15, 15), Rgb([0, 0, 0]));
        assert_eq!(*img.get_pixel(8, 8), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_draw_rect_partially_outside() {
        let mut img = RgbImage::new(20, 20);
        draw_rect(&mut img, -10, -10, 50, 10, RED, 3);
        assert_eq!(*img.get_pixel(5, 10), RED);

        // Degenerate boxes are skipped
        draw_rect(&mut img, 5, 5, 5, 15, Rgb([0, 255, 0]), 1);
        assert_ne!(*img.get_pixel(5, 7), Rgb([0, 255, 0]));
    }

    #[test]
    fn test_extreme_coordinates_clip_without_overflow() {
        let mut img = RgbImage::new(32, 24);
        draw_rect(&mut img, i32::MIN, 0, i32::MAX, 10, RED, 3);
        assert_eq!(*img.get_pixel(16, 9), RED);
        assert_eq!(*img.get_pixel(16, 5), Rgb([0, 0, 0]));

        let orange = Rgb([255, 165, 0]);
        draw_corner_rect(&mut img, i32::MIN, i32::MIN, i32::MAX, i32::MAX, orange, RED, 5, 3);
        draw_text(&mut img, "GUN 99.00%", i32::MAX - 3, 0, RED, Some(RED), 2);
        draw_text(&mut img, "GUN 99.00%", i32::MIN, i32::MIN, RED, Some(RED), 2);
        fill_rect(&mut img, i32::MAX - 1, i32::MAX - 1, u32::MAX, u32::MAX, RED);
        fill_rect(&mut img, i32::MIN, 20, u32::MAX, 2, RED);
        assert_eq!(*img.get_pixel(0, 21), RED);
    }

    #[test]
    fn test_corner_rect() {
        let mut img = RgbImage::new(60, 60);
        let orange = Rgb([255, 165, 0]);
        draw_corner_rect(&mut img, 10, 10, 50, 50, orange, RED, 5, 3);

        // Brackets cover the corners
        assert_eq!(*img.get_pixel(12, 10), RED);
        assert_eq!(*img.get_pixel(47, 49), RED);
        // Outline in the middle of an edge
        assert_eq!(*img.get_pixel(30, 10), orange);
        assert_eq!(*img.get_pixel(30, 30), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_blend_rect() {
        let mut img = RgbImage::from_pixel(10, 10, Rgb([100, 100, 100]));
        blend_rect(&mut img, 2, 2, 4, 4, Rgb([0, 255, 0]), 0.3);

        assert_eq!(*img.get_pixel(3, 3), Rgb([70, 147, 70]));
        assert_eq!(*img.get_pixel(0, 0), Rgb([100, 100, 100]));

        // Region past the edge is clipped
        blend_rect(&mut img, 8, 8, 10, 10, RED, 1.0);
        assert_eq!(*img.get_pixel(9, 9), RED);
    }
}
