use std::thread;
use std::time::{Duration, Instant};

use minifb::{Key, KeyRepeat, ScaleMode, Window, WindowOptions};

use crate::display::domain::frame_display::{DisplayInput, FrameDisplay};
use crate::shared::frame::Frame;

/// Granularity of the wait inside [`MinifbDisplay::poll_input`].
const POLL_SLICE: Duration = Duration::from_millis(1);

/// Shows frames in a native window through `minifb`.
///
/// The window is created on the first frame, sized to it, and recreated
/// whenever the frame size changes.
pub struct MinifbDisplay {
    title: String,
    window: Option<Window>,
    buffer: Vec<u32>,
    width: usize,
    height: usize,
}

impl MinifbDisplay {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            window: None,
            buffer: Vec::new(),
            width: 0,
            height: 0,
        }
    }

    fn ensure_window(&mut self, width: usize, height: usize) -> Result<&mut Window, minifb::Error> {
        if self.width != width || self.height != height {
            if self.window.take().is_some() {
                log::debug!("Frame size changed to {width}x{height}, recreating window");
            }
            self.width = width;
            self.height = height;
        }
        let window = match self.window.take() {
            Some(window) => window,
            None => {
                let mut window = Window::new(
                    &self.title,
                    width,
                    height,
                    WindowOptions {
                        resize: true,
                        scale_mode: ScaleMode::AspectRatioStretch,
                        ..WindowOptions::default()
                    },
                )?;
                // Pacing comes from the key poll, not from the window.
                window.set_target_fps(0);
                log::info!("Opened window \"{}\" ({width}x{height})", self.title);
                window
            }
        };
        Ok(self.window.insert(window))
    }
}

/// Packs `frame` into `0RGB` words, whatever its channel order.
fn pack_pixels(frame: &Frame, buffer: &mut Vec<u32>) {
    let [r, g, b] = frame.layout().rgb_offsets();
    buffer.clear();
    buffer.extend(
        frame
            .data()
            .chunks_exact(frame.channels() as usize)
            .map(|px| ((px[r] as u32) << 16) | ((px[g] as u32) << 8) | px[b] as u32),
    );
}

impl FrameDisplay for MinifbDisplay {
    fn show(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        let (width, height) = (frame.width() as usize, frame.height() as usize);
        if width == 0 || height == 0 {
            return Err("cannot show an empty frame".into());
        }
        let mut buffer = std::mem::take(&mut self.buffer);
        pack_pixels(frame, &mut buffer);
        let result = self
            .ensure_window(width, height)
            .and_then(|window| window.update_with_buffer(&buffer, width, height));
        self.buffer = buffer;
        result.map_err(|e| format!("window update failed: {e}").into())
    }

    fn poll_input(&mut self, timeout: Duration) -> Option<DisplayInput> {
        let window = self.window.as_mut()?;
        let deadline = Instant::now() + timeout;
        loop {
            if !window.is_open() {
                return Some(DisplayInput::WindowClosed);
            }
            let pressed = window.get_keys_pressed(KeyRepeat::No);
            if window.is_key_down(Key::Escape) || pressed.contains(&Key::Escape) {
                return Some(DisplayInput::Escape);
            }
            if !pressed.is_empty() {
                return Some(DisplayInput::OtherKey);
            }

            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            thread::sleep((deadline - now).min(POLL_SLICE));
            window.update();
        }
    }

    fn close(&mut self) {
        if self.window.take().is_some() {
            log::debug!("Closed window \"{}\"", self.title);
        }
        self.buffer = Vec::new();
        self.width = 0;
        self.height = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::frame::PixelLayout;
    use rstest::rstest;

    #[rstest]
    #[case::bgr(PixelLayout::Bgr, vec![30, 20, 10, 0, 0, 255])]
    #[case::rgb(PixelLayout::Rgb, vec![10, 20, 30, 255, 0, 0])]
    fn test_pack_pixels_is_layout_aware(#[case] layout: PixelLayout, #[case] data: Vec<u8>) {
        let frame = Frame::new(data, 2, 1, layout, 0);
        let mut buffer = vec![7; 5];
        pack_pixels(&frame, &mut buffer);
        assert_eq!(buffer, vec![0x000A141E, 0x00FF0000]);
    }

    #[test]
    fn test_poll_without_window_reports_nothing() {
        let mut display = MinifbDisplay::new("test");
        assert_eq!(display.poll_input(Duration::from_millis(1)), None);
    }

    #[test]
    fn test_show_rejects_empty_frame() {
        let mut display = MinifbDisplay::new("test");
        let frame = Frame::new(Vec::new(), 0, 0, PixelLayout::Rgb, 0);
        assert!(display.show(&frame).is_err());
        assert!(display.window.is_none());
    }

    #[test]
    fn test_close_without_window_is_noop() {
        let mut display = MinifbDisplay::new("test");
        display.close();
        display.close();
        assert!(display.window.is_none());
    }
}
