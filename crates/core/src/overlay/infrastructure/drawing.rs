//! Overlay primitives on top of `imageproc::drawing`.
//!
//! imageproc clips against the canvas, so callers can pass coordinates
//! that fall partly or entirely outside the frame.

use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut,
};
use imageproc::rect::Rect;

use crate::shared::frame::PixelLayout;

/// Color as `(r, g, b)`, whatever the frame layout.
pub type Color = [u8; 3];

/// Width of a glyph cell in font pixels.
const GLYPH_WIDTH: i32 = 3;
/// Height of a glyph cell in font pixels.
const GLYPH_HEIGHT: i32 = 5;

/// Draws on a frame's pixels, writing colors in the frame's byte order.
pub struct Painter<'a> {
    canvas: &'a mut RgbImage,
    layout: PixelLayout,
}

impl<'a> Painter<'a> {
    pub fn new(canvas: &'a mut RgbImage, layout: PixelLayout) -> Self {
        Self { canvas, layout }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.canvas.dimensions()
    }

    fn pixel(&self, color: Color) -> Rgb<u8> {
        Rgb(self.layout.arrange(color))
    }

    /// Segment from `a` to `b`, both ends included, `thickness` pixels wide.
    pub fn line(&mut self, a: (i32, i32), b: (i32, i32), thickness: i32, color: Color) {
        let pixel = self.pixel(color);
        let (lo, hi) = spread(thickness);
        for dy in lo..hi {
            for dx in lo..hi {
                draw_line_segment_mut(
                    self.canvas,
                    ((a.0 + dx) as f32, (a.1 + dy) as f32),
                    ((b.0 + dx) as f32, (b.1 + dy) as f32),
                    pixel,
                );
            }
        }
    }

    /// Outline through corners `a` and `b`, growing inward with `thickness`.
    pub fn rect(&mut self, a: (i32, i32), b: (i32, i32), thickness: i32, color: Color) {
        let pixel = self.pixel(color);
        let (left, right) = (a.0.min(b.0), a.0.max(b.0));
        let (top, bottom) = (a.1.min(b.1), a.1.max(b.1));
        for inset in 0..thickness.max(1) {
            let width = right - left + 1 - 2 * inset;
            let height = bottom - top + 1 - 2 * inset;
            if width <= 0 || height <= 0 {
                break;
            }
            let outline = Rect::at(left + inset, top + inset).of_size(width as u32, height as u32);
            draw_hollow_rect_mut(self.canvas, outline, pixel);
        }
    }

    /// Filled disc of `radius` around `center`.
    pub fn disc(&mut self, center: (i32, i32), radius: i32, color: Color) {
        let pixel = self.pixel(color);
        draw_filled_circle_mut(self.canvas, center, radius.max(0), pixel);
    }

    /// Draws `text` with its top-left corner at `origin`.
    pub fn text(&mut self, origin: (i32, i32), text: &str, scale: i32, color: Color) {
        let pixel = self.pixel(color);
        let scale = scale.max(1);
        let mut x = origin.0;
        for c in text.chars() {
            for (row, &bits) in glyph(c).iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if (bits >> (GLYPH_WIDTH - 1 - col)) & 1 == 0 {
                        continue;
                    }
                    let cell = Rect::at(x + col * scale, origin.1 + row as i32 * scale)
                        .of_size(scale as u32, scale as u32);
                    draw_filled_rect_mut(self.canvas, cell, pixel);
                }
            }
            x += (GLYPH_WIDTH + 1) * scale;
        }
    }
}

/// Offsets covering `thickness` pixels around zero.
fn spread(thickness: i32) -> (i32, i32) {
    let thickness = thickness.max(1);
    let lo = -(thickness - 1) / 2;
    (lo, lo + thickness)
}

/// 3x5 bitmap rows; bit 2 is the leftmost column.
fn glyph(c: char) -> [u8; 5] {
    match c {
        '0' => [0x7, 0x5, 0x5, 0x5, 0x7],
        '1' => [0x2, 0x6, 0x2, 0x2, 0x7],
        '2' => [0x7, 0x1, 0x7, 0x4, 0x7],
        '3' => [0x7, 0x1, 0x7, 0x1, 0x7],
        '4' => [0x5, 0x5, 0x7, 0x1, 0x1],
        '5' => [0x7, 0x4, 0x7, 0x1, 0x7],
        '6' => [0x7, 0x4, 0x7, 0x5, 0x7],
        '7' => [0x7, 0x1, 0x2, 0x4, 0x4],
        '8' => [0x7, 0x5, 0x7, 0x5, 0x7],
        '9' => [0x7, 0x5, 0x7, 0x1, 0x7],
        '.' => [0x0, 0x0, 0x0, 0x0, 0x2],
        '%' => [0x5, 0x1, 0x2, 0x4, 0x5],
        ' ' => [0x0; 5],
        _ => [0x7; 5],
    }
}

/// Size in pixels of `text` rendered at `scale`.
pub fn text_size(text: &str, scale: i32) -> (i32, i32) {
    let n = text.chars().count() as i32;
    let width = if n == 0 {
        0
    } else {
        n * (GLYPH_WIDTH + 1) * scale - scale
    };
    (width, GLYPH_HEIGHT * scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const RED: Color = [255, 0, 0];

    fn lit(canvas: &RgbImage) -> Vec<(u32, u32)> {
        canvas
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0 != [0, 0, 0])
            .map(|(x, y, _)| (x, y))
            .collect()
    }

    #[rstest]
    #[case::horizontal((1, 2), (6, 2))]
    #[case::vertical((3, 0), (3, 7))]
    #[case::diagonal((0, 0), (7, 7))]
    #[case::reversed((7, 5), (0, 1))]
    fn test_line_includes_both_endpoints(#[case] a: (i32, i32), #[case] b: (i32, i32)) {
        let mut canvas = RgbImage::new(8, 8);
        Painter::new(&mut canvas, PixelLayout::Rgb).line(a, b, 1, RED);
        assert_eq!(canvas.get_pixel(a.0 as u32, a.1 as u32).0, RED);
        assert_eq!(canvas.get_pixel(b.0 as u32, b.1 as u32).0, RED);
    }

    #[test]
    fn test_thick_line_covers_neighbours() {
        let mut canvas = RgbImage::new(8, 5);
        Painter::new(&mut canvas, PixelLayout::Rgb).line((1, 2), (6, 2), 3, RED);
        for x in 1..=6 {
            for y in 1..=3 {
                assert_eq!(canvas.get_pixel(x, y).0, RED);
            }
        }
        assert_eq!(canvas.get_pixel(3, 0).0, [0, 0, 0]);
    }

    #[test]
    fn test_line_clips_outside_frame() {
        let mut canvas = RgbImage::new(4, 4);
        Painter::new(&mut canvas, PixelLayout::Rgb).line((-10, -10), (20, 20), 2, RED);
        assert_eq!(canvas.get_pixel(0, 0).0, RED);
        assert_eq!(canvas.get_pixel(3, 3).0, RED);
    }

    #[test]
    fn test_colors_follow_layout() {
        let mut canvas = RgbImage::new(3, 3);
        Painter::new(&mut canvas, PixelLayout::Bgr).disc((1, 1), 0, RED);
        assert_eq!(canvas.get_pixel(1, 1).0, [0, 0, 255]);
    }

    #[test]
    fn test_rect_draws_outline_only() {
        let mut canvas = RgbImage::new(6, 6);
        Painter::new(&mut canvas, PixelLayout::Rgb).rect((4, 4), (1, 1), 1, RED);
        for corner in [(1, 1), (4, 1), (1, 4), (4, 4)] {
            assert_eq!(canvas.get_pixel(corner.0, corner.1).0, RED);
        }
        assert_eq!(canvas.get_pixel(2, 2).0, [0, 0, 0]);
        assert_eq!(lit(&canvas).len(), 12);
    }

    #[test]
    fn test_thick_rect_grows_inward() {
        let mut canvas = RgbImage::new(8, 8);
        Painter::new(&mut canvas, PixelLayout::Rgb).rect((1, 1), (6, 6), 2, RED);
        assert_eq!(canvas.get_pixel(2, 2).0, RED);
        assert_eq!(canvas.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(canvas.get_pixel(3, 3).0, [0, 0, 0]);
    }

    #[test]
    fn test_thick_rect_on_tiny_box_does_not_panic() {
        let mut canvas = RgbImage::new(4, 4);
        Painter::new(&mut canvas, PixelLayout::Rgb).rect((1, 1), (1, 2), 3, RED);
        assert_eq!(lit(&canvas), vec![(1, 1), (1, 2)]);
    }

    #[test]
    fn test_disc_radius() {
        let mut canvas = RgbImage::new(9, 9);
        Painter::new(&mut canvas, PixelLayout::Rgb).disc((4, 4), 2, RED);
        assert_eq!(canvas.get_pixel(4, 4).0, RED);
        assert_eq!(canvas.get_pixel(6, 4).0, RED);
        assert_eq!(canvas.get_pixel(4, 2).0, RED);
        assert_eq!(canvas.get_pixel(7, 4).0, [0, 0, 0]);
        assert_eq!(canvas.get_pixel(8, 8).0, [0, 0, 0]);
    }

    #[test]
    fn test_text_size() {
        assert_eq!(text_size("", 2), (0, 10));
        assert_eq!(text_size("1", 1), (3, 5));
        assert_eq!(text_size("93.50%", 2), (46, 10));
    }

    #[test]
    fn test_draw_digit_one() {
        let mut canvas = RgbImage::new(3, 5);
        Painter::new(&mut canvas, PixelLayout::Rgb).text((0, 0), "1", 1, RED);
        // 010 / 110 / 010 / 010 / 111
        let mut expected = vec![(1, 0), (0, 1), (1, 1), (1, 2), (1, 3), (0, 4), (1, 4), (2, 4)];
        expected.sort_by_key(|&(x, y)| (y, x));
        assert_eq!(lit(&canvas), expected);
    }

    #[test]
    fn test_text_stays_within_measured_box() {
        let mut canvas = RgbImage::new(60, 20);
        let (w, h) = text_size("87.25%", 2);
        Painter::new(&mut canvas, PixelLayout::Rgb).text((5, 5), "87.25%", 2, RED);
        for (x, y) in lit(&canvas) {
            assert!((5..5 + w).contains(&(x as i32)));
            assert!((5..5 + h).contains(&(y as i32)));
        }
    }
}
