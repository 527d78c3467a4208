use crate::shared::frame::Frame;

use super::detection::Detection;

/// Domain interface for the external detection capability.
///
/// Implementations may keep tracking state across frames, hence
/// `&mut self`. Input frames must be in RGB order.
pub trait Detector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>>;

    /// Releases model resources. Safe to call more than once.
    fn close(&mut self);
}
