use crate::shared::frame::{Frame, PixelLayout};
use crate::shared::source::SourceLocator;
use crate::video::domain::frame_source::{FrameSource, SourceInfo};

/// Adapts a single image file to the [`FrameSource`] interface.
///
/// The image is a one-frame source with `fps = 0`; the frame is handed
/// out in BGR order so it looks like any decoded capture frame.
#[derive(Default)]
pub struct ImageFileSource {
    frame: Option<Frame>,
    opened: bool,
}

impl ImageFileSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameSource for ImageFileSource {
    fn open(&mut self, locator: &SourceLocator) -> Result<SourceInfo, Box<dyn std::error::Error>> {
        let SourceLocator::File(path) = locator else {
            return Err(format!("ImageFileSource cannot open {locator}").into());
        };
        if self.opened {
            return Err("ImageFileSource: already open".into());
        }

        let rgb = image::open(path)?.into_rgb8();
        let (width, height) = rgb.dimensions();
        let frame = Frame::new(rgb.into_raw(), width, height, PixelLayout::Rgb, 0)
            .to_layout(PixelLayout::Bgr);

        self.frame = Some(frame);
        self.opened = true;
        log::info!("Opened image {} ({}x{})", path.display(), width, height);
        Ok(SourceInfo {
            width,
            height,
            fps: 0.0,
            codec: String::new(),
        })
    }

    fn read(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        if !self.opened {
            return Err("ImageFileSource: not opened".into());
        }
        Ok(self.frame.take())
    }

    fn close(&mut self) {
        self.frame = None;
        self.opened = false;
    }
}
