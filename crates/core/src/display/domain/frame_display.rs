use std::time::Duration;

use crate::shared::frame::Frame;

/// User input observed while waiting between frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayInput {
    /// The cancellation key.
    Escape,
    /// Any other key; ignored by the live view.
    OtherKey,
    /// The window was closed by the user or the window system.
    WindowClosed,
}

/// Domain interface for presenting annotated frames to the user.
///
/// Not `Send`: window handles generally have to stay on the thread that
/// created them.
pub trait FrameDisplay {
    /// Presents `frame`. Frames may be in any [`PixelLayout`].
    ///
    /// [`PixelLayout`]: crate::shared::frame::PixelLayout
    fn show(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>>;

    /// Waits at most `timeout` for input. `None` when nothing happened.
    fn poll_input(&mut self, timeout: Duration) -> Option<DisplayInput>;

    /// Destroys the window. Idempotent.
    fn close(&mut self);
}
