use crate::shared::frame::Frame;
use crate::shared::source::SourceLocator;

/// What a frame source learned about its input when it was opened.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    /// 0.0 when the container does not report a rate (devices, stills).
    pub fps: f64,
    pub codec: String,
}

/// Decodes frames from a file, a capture device, or a stream URL.
///
/// Frames are produced lazily, one `read` at a time, in the source's
/// native channel order.
pub trait FrameSource: Send {
    /// Opens the source. At most one source is open per instance.
    fn open(&mut self, locator: &SourceLocator) -> Result<SourceInfo, Box<dyn std::error::Error>>;

    /// Returns the next frame, `Ok(None)` at end of stream.
    fn read(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>>;

    /// Releases the underlying handle. Safe to call repeatedly, and before
    /// or after a failed `open`.
    fn close(&mut self);
}
