//! Frame → model input tensor conversion.
//!
//! Two crops are supported: an aspect-preserving letterbox of the whole
//! frame (detection models) and a rotated square region of interest
//! (landmark models). Both sample bilinearly and treat pixels outside the
//! frame as black.

use ndarray::{Array4, ArrayView3};

use crate::shared::frame::{Frame, PixelLayout};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TensorLayout {
    Nchw,
    Nhwc,
}

/// Output value range that pixel values 0..=255 are mapped onto.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FloatRange {
    pub min: f32,
    pub max: f32,
}

impl FloatRange {
    pub const UNIT: FloatRange = FloatRange { min: 0.0, max: 1.0 };
    pub const SIGNED: FloatRange = FloatRange {
        min: -1.0,
        max: 1.0,
    };

    fn map(&self, value: f32) -> f32 {
        self.min + value / 255.0 * (self.max - self.min)
    }
}

/// Where the frame landed inside a letterboxed model input, as fractions
/// of the input size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Letterbox {
    pub offset_x: f32,
    pub offset_y: f32,
    pub content_width: f32,
    pub content_height: f32,
}

impl Letterbox {
    /// Maps a normalized model-input point to a normalized frame point.
    pub fn unpad_point(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x - self.offset_x) / self.content_width,
            (y - self.offset_y) / self.content_height,
        )
    }

    /// Maps a normalized model-input extent to a normalized frame extent.
    pub fn unpad_size(&self, w: f32, h: f32) -> (f32, f32) {
        (w / self.content_width, h / self.content_height)
    }
}

/// Square region in frame pixels, rotated by `rotation` radians
/// (counter-clockwise in image coordinates) about its center.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RotatedRect {
    pub center_x: f32,
    pub center_y: f32,
    pub size: f32,
    pub rotation: f32,
}

impl RotatedRect {
    /// Maps a point given in fractions of the rect (0..1 on both axes)
    /// to frame pixels.
    pub fn to_frame(&self, u: f32, v: f32) -> (f32, f32) {
        let dx = (u - 0.5) * self.size;
        let dy = (v - 0.5) * self.size;
        let (sin, cos) = self.rotation.sin_cos();
        (
            self.center_x + dx * cos - dy * sin,
            self.center_y + dx * sin + dy * cos,
        )
    }

    /// Axis-aligned `[x1, y1, x2, y2]` hull of the rotated rect.
    pub fn bounds(&self) -> [f32; 4] {
        let corners = [
            self.to_frame(0.0, 0.0),
            self.to_frame(1.0, 0.0),
            self.to_frame(0.0, 1.0),
            self.to_frame(1.0, 1.0),
        ];
        let mut b = [f32::MAX, f32::MAX, f32::MIN, f32::MIN];
        for (x, y) in corners {
            b[0] = b[0].min(x);
            b[1] = b[1].min(y);
            b[2] = b[2].max(x);
            b[3] = b[3].max(y);
        }
        b
    }
}

/// Resizes the whole frame into a `size`×`size` tensor, keeping its
/// aspect ratio and padding the short side symmetrically.
pub fn letterbox_tensor(
    frame: &Frame,
    size: u32,
    range: FloatRange,
    layout: TensorLayout,
) -> Result<(Array4<f32>, Letterbox), &'static str> {
    check_rgb(frame)?;
    let fw = frame.width() as f32;
    let fh = frame.height() as f32;
    let target = size as f32;

    let scale = (target / fw).min(target / fh);
    let content_w = (fw * scale).round().max(1.0);
    let content_h = (fh * scale).round().max(1.0);
    let offset_x = ((target - content_w) / 2.0).floor();
    let offset_y = ((target - content_h) / 2.0).floor();

    let src = frame.as_ndarray().map_err(|_| MISSHAPEN_FRAME)?;
    let tensor = tensor_from_fn(layout, size as usize, |ty, tx, c| {
        let x = tx as f32 - offset_x;
        let y = ty as f32 - offset_y;
        if x < 0.0 || y < 0.0 || x >= content_w || y >= content_h {
            return range.map(0.0);
        }
        let sx = (x + 0.5) / scale - 0.5;
        let sy = (y + 0.5) / scale - 0.5;
        range.map(sample_bilinear(&src, sx, sy, c))
    });

    let letterbox = Letterbox {
        offset_x: offset_x / target,
        offset_y: offset_y / target,
        content_width: content_w / target,
        content_height: content_h / target,
    };
    Ok((tensor, letterbox))
}

/// Crops `roi` out of the frame into a `size`×`size` tensor.
pub fn crop_tensor(
    frame: &Frame,
    roi: &RotatedRect,
    size: u32,
    range: FloatRange,
    layout: TensorLayout,
) -> Result<Array4<f32>, &'static str> {
    check_rgb(frame)?;
    let src = frame.as_ndarray().map_err(|_| MISSHAPEN_FRAME)?;
    let s = size as f32;
    Ok(tensor_from_fn(layout, size as usize, |ty, tx, c| {
        let (fx, fy) = roi.to_frame((tx as f32 + 0.5) / s, (ty as f32 + 0.5) / s);
        range.map(sample_bilinear(&src, fx - 0.5, fy - 0.5, c))
    }))
}

const MISSHAPEN_FRAME: &str = "frame data does not match its dimensions";

fn check_rgb(frame: &Frame) -> Result<(), &'static str> {
    if frame.layout() != PixelLayout::Rgb {
        return Err("model input frames must be in RGB order");
    }
    if frame.width() == 0 || frame.height() == 0 {
        return Err("cannot build a model input from an empty frame");
    }
    Ok(())
}

fn tensor_from_fn(
    layout: TensorLayout,
    size: usize,
    f: impl Fn(usize, usize, usize) -> f32,
) -> Array4<f32> {
    match layout {
        TensorLayout::Nchw => Array4::from_shape_fn((1, 3, size, size), |(_, c, y, x)| f(y, x, c)),
        TensorLayout::Nhwc => Array4::from_shape_fn((1, size, size, 3), |(_, y, x, c)| f(y, x, c)),
    }
}

/// Bilinear sample at pixel-center coordinates; outside pixels are 0.
fn sample_bilinear(src: &ArrayView3<'_, u8>, x: f32, y: f32, c: usize) -> f32 {
    let (h, w, _) = src.dim();
    let x0 = x.floor();
    let y0 = y.floor();
    let ax = x - x0;
    let ay = y - y0;

    let px = |xi: f32, yi: f32| -> f32 {
        if xi < 0.0 || yi < 0.0 || xi >= w as f32 || yi >= h as f32 {
            0.0
        } else {
            src[[yi as usize, xi as usize, c]] as f32
        }
    };

    let top = px(x0, y0) * (1.0 - ax) + px(x0 + 1.0, y0) * ax;
    let bottom = px(x0, y0 + 1.0) * (1.0 - ax) + px(x0 + 1.0, y0 + 1.0) * ax;
    top * (1.0 - ay) + bottom * ay
}
