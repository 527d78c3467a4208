use image::RgbImage;
use ndarray::{ArrayView3, ShapeError};

/// Channel order of a three-channel, 8-bit frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelLayout {
    /// Native order of decoded capture frames.
    Bgr,
    /// Order expected by the detection models.
    Rgb,
}

impl PixelLayout {
    pub const CHANNELS: u8 = 3;

    /// Byte offsets of the (red, green, blue) components within a pixel.
    pub fn rgb_offsets(self) -> [usize; 3] {
        match self {
            PixelLayout::Rgb => [0, 1, 2],
            PixelLayout::Bgr => [2, 1, 0],
        }
    }

    /// Reorders an `(r, g, b)` color into this layout's byte order.
    pub fn arrange(self, [r, g, b]: [u8; 3]) -> [u8; 3] {
        match self {
            PixelLayout::Rgb => [r, g, b],
            PixelLayout::Bgr => [b, g, r],
        }
    }
}

/// A single decoded frame: contiguous 8-bit pixels in row-major order.
///
/// The layout tag travels with the bytes so stages that care about
/// channel order (detectors, the display) can check it instead of
/// assuming it.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    layout: PixelLayout,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, layout: PixelLayout, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (PixelLayout::CHANNELS as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            layout,
            index,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        PixelLayout::CHANNELS
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns `(r, g, b)` at `(x, y)`, regardless of the stored layout.
    pub fn rgb_at(&self, x: u32, y: u32) -> [u8; 3] {
        let offset = self.offset(x, y);
        let [r, g, b] = self.layout.rgb_offsets();
        [
            self.data[offset + r],
            self.data[offset + g],
            self.data[offset + b],
        ]
    }

    /// Flips the frame left-to-right in place (selfie view).
    pub fn mirror_horizontal(&mut self) {
        let w = self.width as usize;
        let c = PixelLayout::CHANNELS as usize;
        if w < 2 {
            return;
        }
        for row in self.data.chunks_exact_mut(w * c) {
            for x in 0..w / 2 {
                let left = x * c;
                let right = (w - 1 - x) * c;
                for ch in 0..c {
                    row.swap(left + ch, right + ch);
                }
            }
        }
    }

    /// Copies the frame into `layout`, reordering channels when needed.
    pub fn to_layout(&self, layout: PixelLayout) -> Frame {
        let mut data = self.data.clone();
        if layout != self.layout {
            for px in data.chunks_exact_mut(PixelLayout::CHANNELS as usize) {
                px.swap(0, 2);
            }
        }
        Frame {
            data,
            width: self.width,
            height: self.height,
            layout,
            index: self.index,
        }
    }

    /// Lends the pixels to `draw` as an `image` buffer, then takes them back.
    ///
    /// The buffer keeps the stored byte order, so colors written through it
    /// go through [`PixelLayout::arrange`] first. Returns `None` when the
    /// data does not match the frame dimensions.
    pub fn with_image<R>(&mut self, draw: impl FnOnce(&mut RgbImage) -> R) -> Option<R> {
        let (h, w, c) = self.shape();
        if self.data.len() != h * w * c {
            return None;
        }
        let data = std::mem::take(&mut self.data);
        let mut image = RgbImage::from_raw(self.width, self.height, data)?;
        let result = draw(&mut image);
        self.data = image.into_raw();
        Some(result)
    }

    /// `[height, width, channel]` view of the pixels.
    pub fn as_ndarray(&self) -> Result<ArrayView3<'_, u8>, ShapeError> {
        ArrayView3::from_shape(self.shape(), &self.data)
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        ((y as usize) * (self.width as usize) + x as usize) * PixelLayout::CHANNELS as usize
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            PixelLayout::CHANNELS as usize,
        )
    }
}
