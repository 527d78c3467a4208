use ffmpeg_next::format::context::Input;
use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video;

use crate::shared::frame::{Frame, PixelLayout};
use crate::shared::source::SourceLocator;
use crate::video::domain::frame_source::{FrameSource, SourceInfo};

/// Decodes frames from files, capture devices and network streams via
/// ffmpeg-next (libavformat + libavdevice + libavcodec).
///
/// Frames come out as BGR24, the native order of capture pipelines.
pub struct FfmpegSource {
    session: Option<DecodeSession>,
    frame_index: usize,
}

// Safety: FfmpegSource is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegSource {}

impl FfmpegSource {
    pub fn new() -> Self {
        Self {
            session: None,
            frame_index: 0,
        }
    }
}

impl Default for FfmpegSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything needed to pull frames out of one opened input.
struct DecodeSession {
    ictx: Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: scaling::Context,
    stream_index: usize,
    width: u32,
    height: u32,
    flushing: bool,
}

impl DecodeSession {
    /// Decodes until a frame is available or the input is drained.
    fn next_pixels(&mut self) -> Result<Option<Vec<u8>>, Box<dyn std::error::Error>> {
        loop {
            if let Some(pixels) = self.try_receive()? {
                return Ok(Some(pixels));
            }
            if self.flushing {
                return Ok(None);
            }

            let mut packet = ffmpeg_next::Packet::empty();
            match packet.read(&mut self.ictx) {
                Ok(()) => {
                    if packet.stream() != self.stream_index {
                        continue;
                    }
                    if let Err(e) = self.decoder.send_packet(&packet) {
                        log::debug!("Skipping undecodable packet: {e}");
                    }
                }
                Err(ffmpeg_next::Error::Eof) => {
                    let _ = self.decoder.send_eof();
                    self.flushing = true;
                }
                Err(ffmpeg_next::Error::Other {
                    errno: ffmpeg_next::error::EAGAIN,
                }) => continue,
                Err(e) => return Err(Box::new(e)),
            }
        }
    }

    fn try_receive(&mut self) -> Result<Option<Vec<u8>>, Box<dyn std::error::Error>> {
        let mut decoded = Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }
        let mut bgr_frame = Video::empty();
        self.scaler.run(&decoded, &mut bgr_frame)?;
        Ok(Some(extract_packed_pixels(
            &bgr_frame,
            self.width,
            self.height,
        )))
    }
}

impl FrameSource for FfmpegSource {
    fn open(&mut self, locator: &SourceLocator) -> Result<SourceInfo, Box<dyn std::error::Error>> {
        if self.session.is_some() {
            return Err("FfmpegSource: already open".into());
        }
        ffmpeg_next::init()?;

        let ictx = open_input(locator)?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;

        let stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };

        let width = decoder.width();
        let height = decoder.height();
        if width == 0 || height == 0 {
            return Err(format!("{locator} reports an empty frame size").into());
        }

        let scaler = scaling::Context::get(
            decoder.format(),
            width,
            height,
            Pixel::BGR24,
            width,
            height,
            scaling::Flags::BILINEAR,
        )?;

        let info = SourceInfo {
            width,
            height,
            fps,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
        };

        self.session = Some(DecodeSession {
            ictx,
            decoder,
            scaler,
            stream_index,
            width,
            height,
            flushing: false,
        });
        self.frame_index = 0;
        log::info!(
            "Opened {locator}: {}x{} {} @ {:.1} fps",
            info.width,
            info.height,
            info.codec,
            info.fps
        );
        Ok(info)
    }

    fn read(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        let session = self.session.as_mut().ok_or("FfmpegSource: not opened")?;
        let Some(pixels) = session.next_pixels()? else {
            return Ok(None);
        };
        let frame = Frame::new(
            pixels,
            session.width,
            session.height,
            PixelLayout::Bgr,
            self.frame_index,
        );
        self.frame_index += 1;
        Ok(Some(frame))
    }

    fn close(&mut self) {
        if self.session.take().is_some() {
            log::debug!("Video source closed after {} frames", self.frame_index);
        }
    }
}

fn open_input(locator: &SourceLocator) -> Result<Input, Box<dyn std::error::Error>> {
    match locator {
        SourceLocator::File(path) => Ok(ffmpeg_next::format::input(path)?),
        SourceLocator::Stream(url) => {
            ffmpeg_next::format::network::init();
            Ok(ffmpeg_next::format::input(url)?)
        }
        SourceLocator::Device(index) => open_device(*index),
    }
}

/// Capture backend and device URL for a camera index on this platform.
fn device_input(index: u32) -> (&'static str, String) {
    #[cfg(target_os = "linux")]
    {
        ("video4linux2,v4l2", format!("/dev/video{index}"))
    }
    #[cfg(target_os = "macos")]
    {
        ("avfoundation", index.to_string())
    }
    #[cfg(target_os = "windows")]
    {
        ("vfwcap", index.to_string())
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        ("video4linux2,v4l2", format!("/dev/video{index}"))
    }
}

fn open_device(index: u32) -> Result<Input, Box<dyn std::error::Error>> {
    ffmpeg_next::device::register_all();
    let (backend, url) = device_input(index);
    let format = ffmpeg_next::device::input::video()
        .find(|f| f.name() == backend)
        .ok_or_else(|| format!("capture backend {backend} is not available in this ffmpeg build"))?;
    let ctx = ffmpeg_next::format::open_with(&url, &format, ffmpeg_next::Dictionary::new())?;
    Ok(ctx.input())
}

/// Copies pixel data from an ffmpeg frame into a contiguous buffer.
///
/// ffmpeg frames may have padding bytes at the end of each row (stride > width*3).
/// This function strips that padding to produce a tightly-packed pixel buffer.
fn extract_packed_pixels(frame: &Video, width: u32, height: u32) -> Vec<u8> {
    let stride = frame.stride(0);
    let data = frame.data(0);
    let row_bytes = width as usize * PixelLayout::CHANNELS as usize;

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + row_bytes]);
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    /// Writes an MPEG-4 clip of solid frames, all of one RGB color.
    fn create_test_video(path: &Path, num_frames: usize, width: u32, height: u32, rgb: [u8; 3]) {
        ffmpeg_next::init().unwrap();
        let fps = 30;

        let mut octx = ffmpeg_next::format::output(path).unwrap();
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4).unwrap();
        let mut ost = octx.add_stream(Some(codec)).unwrap();

        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .unwrap();
        encoder_ctx.set_width(width);
        encoder_ctx.set_height(height);
        encoder_ctx.set_format(Pixel::YUV420P);
        encoder_ctx.set_time_base(ffmpeg_next::Rational(1, fps));
        encoder_ctx.set_frame_rate(Some(ffmpeg_next::Rational(fps, 1)));
        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let mut encoder = encoder_ctx
            .open_with(ffmpeg_next::Dictionary::new())
            .unwrap();
        ost.set_parameters(&encoder);
        octx.write_header().unwrap();
        let ost_time_base = octx.stream(0).unwrap().time_base();

        let mut scaler = scaling::Context::get(
            Pixel::RGB24,
            width,
            height,
            Pixel::YUV420P,
            width,
            height,
            scaling::Flags::BILINEAR,
        )
        .unwrap();

        for i in 0..num_frames {
            let mut rgb_frame = Video::new(Pixel::RGB24, width, height);
            let stride = rgb_frame.stride(0);
            let data = rgb_frame.data_mut(0);
            for row in 0..height as usize {
                for col in 0..width as usize {
                    let offset = row * stride + col * 3;
                    data[offset..offset + 3].copy_from_slice(&rgb);
                }
            }

            let mut yuv_frame = Video::empty();
            scaler.run(&rgb_frame, &mut yuv_frame).unwrap();
            yuv_frame.set_pts(Some(i as i64));
            encoder.send_frame(&yuv_frame).unwrap();
            write_pending(&mut encoder, &mut octx, fps, ost_time_base);
        }

        encoder.send_eof().unwrap();
        write_pending(&mut encoder, &mut octx, fps, ost_time_base);
        octx.write_trailer().unwrap();
    }

    fn write_pending(
        encoder: &mut ffmpeg_next::encoder::Video,
        octx: &mut ffmpeg_next::format::context::Output,
        fps: i32,
        time_base: ffmpeg_next::Rational,
    ) {
        let mut encoded = ffmpeg_next::Packet::empty();
        while encoder.receive_packet(&mut encoded).is_ok() {
            encoded.set_stream(0);
            encoded.rescale_ts(ffmpeg_next::Rational(1, fps), time_base);
            encoded.write_interleaved(octx).unwrap();
        }
    }

    fn test_video(dir: &Path, num_frames: usize) -> PathBuf {
        let path = dir.join("test.mp4");
        create_test_video(&path, num_frames, 160, 120, [220, 30, 30]);
        path
    }

    fn read_all(source: &mut FfmpegSource) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(frame) = source.read().unwrap() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn test_open_returns_info() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_video(dir.path(), 3);

        let mut source = FfmpegSource::new();
        let info = source.open(&SourceLocator::File(path)).unwrap();
        assert_eq!(info.width, 160);
        assert_eq!(info.height, 120);
        assert!(info.fps > 0.0);
        assert_eq!(info.codec, "mpeg4");
    }

    #[test]
    fn test_open_nonexistent_file_fails() {
        let mut source = FfmpegSource::new();
        let locator = SourceLocator::File(PathBuf::from("/nonexistent/test.mp4"));
        assert!(source.open(&locator).is_err());
        // close after a failed open is a no-op
        source.close();
    }

    #[test]
    fn test_open_missing_device_fails() {
        let mut source = FfmpegSource::new();
        assert!(source.open(&SourceLocator::Device(97)).is_err());
    }

    #[test]
    fn test_open_unreachable_stream_fails() {
        let mut source = FfmpegSource::new();
        let locator = SourceLocator::Stream("http://127.0.0.1:9/clip.mp4".into());
        assert!(source.open(&locator).is_err());
    }

    #[test]
    fn test_reads_every_frame_then_end_of_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_video(dir.path(), 5);

        let mut source = FfmpegSource::new();
        source.open(&SourceLocator::File(path)).unwrap();
        let frames = read_all(&mut source);
        assert_eq!(frames.len(), 5);
        // stays exhausted
        assert!(source.read().unwrap().is_none());
    }

    #[test]
    fn test_frames_have_sequential_indices() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_video(dir.path(), 4);

        let mut source = FfmpegSource::new();
        source.open(&SourceLocator::File(path)).unwrap();
        for (i, frame) in read_all(&mut source).iter().enumerate() {
            assert_eq!(frame.index(), i);
        }
    }

    #[test]
    fn test_frames_are_packed_bgr() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_video(dir.path(), 1);

        let mut source = FfmpegSource::new();
        source.open(&SourceLocator::File(path)).unwrap();
        let frame = source.read().unwrap().unwrap();
        assert_eq!(frame.layout(), PixelLayout::Bgr);
        assert_eq!(frame.data().len(), 160 * 120 * 3);

        // Mostly-red clip: blue byte first, red byte last.
        let center = frame.data()[(60 * 160 + 80) * 3..(60 * 160 + 80) * 3 + 3].to_vec();
        assert!(center[2] > 150, "red channel too low: {center:?}");
        assert!(center[0] < 100, "blue channel too high: {center:?}");
    }

    #[test]
    fn test_read_without_open_fails() {
        let mut source = FfmpegSource::new();
        assert!(source.read().is_err());
    }

    #[test]
    fn test_second_open_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_video(dir.path(), 1);
        let locator = SourceLocator::File(path);

        let mut source = FfmpegSource::new();
        source.open(&locator).unwrap();
        assert!(source.open(&locator).is_err());
    }

    #[test]
    fn test_close_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_video(dir.path(), 1);

        let mut source = FfmpegSource::new();
        source.open(&SourceLocator::File(path)).unwrap();
        source.close();
        source.close();
        assert!(source.read().is_err());
    }
}
