use crate::shared::frame::Frame;
use crate::shared::source::SourceLocator;
use crate::video::domain::frame_source::{FrameSource, SourceInfo};

use super::ffmpeg_source::FfmpegSource;
use super::image_file_source::ImageFileSource;

/// Picks the frame source able to open `locator`: still images go through
/// the `image` crate, everything else through ffmpeg.
pub fn open_frame_source(locator: &SourceLocator) -> Box<dyn FrameSource> {
    if locator.is_image_file() {
        Box::new(ImageFileSource::new())
    } else {
        Box::new(FfmpegSource::new())
    }
}

/// Frame source that defers the choice of adapter until `open`, when the
/// locator (possibly a freshly resolved stream URL) is known.
#[derive(Default)]
pub struct AutoFrameSource {
    inner: Option<Box<dyn FrameSource>>,
}

impl AutoFrameSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameSource for AutoFrameSource {
    fn open(&mut self, locator: &SourceLocator) -> Result<SourceInfo, Box<dyn std::error::Error>> {
        if self.inner.is_some() {
            return Err("AutoFrameSource: already open".into());
        }
        let mut source = open_frame_source(locator);
        match source.open(locator) {
            Ok(info) => {
                self.inner = Some(source);
                Ok(info)
            }
            Err(e) => {
                source.close();
                Err(e)
            }
        }
    }

    fn read(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        match self.inner.as_mut() {
            Some(source) => source.read(),
            None => Err("AutoFrameSource: not opened".into()),
        }
    }

    fn close(&mut self) {
        if let Some(mut source) = self.inner.take() {
            source.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_image_files_get_an_image_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("still.png");
        image::RgbImage::new(4, 4).save(&path).unwrap();

        let locator = SourceLocator::File(path);
        let mut source = open_frame_source(&locator);
        let info = source.open(&locator).unwrap();
        assert_eq!(info.fps, 0.0);
        assert!(source.read().unwrap().is_some());
        assert!(source.read().unwrap().is_none());
        source.close();
    }

    #[test]
    fn test_missing_video_file_fails_to_open() {
        let locator = SourceLocator::File(PathBuf::from("/nonexistent/face.mp4"));
        let mut source = open_frame_source(&locator);
        assert!(source.open(&locator).is_err());
        source.close();
    }

    #[test]
    fn test_auto_source_delegates_to_image_adapter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("still.jpg");
        image::RgbImage::new(6, 4).save(&path).unwrap();

        let mut source = AutoFrameSource::new();
        let info = source.open(&SourceLocator::File(path)).unwrap();
        assert_eq!((info.width, info.height), (6, 4));
        let frame = source.read().unwrap().unwrap();
        assert_eq!(frame.width(), 6);
        assert!(source.read().unwrap().is_none());
    }

    #[test]
    fn test_auto_source_failed_open_leaves_it_closed() {
        let mut source = AutoFrameSource::new();
        let locator = SourceLocator::File(PathBuf::from("/nonexistent/face.mp4"));
        assert!(source.open(&locator).is_err());
        assert!(source.read().is_err());
        source.close();
        source.close();
    }
}
