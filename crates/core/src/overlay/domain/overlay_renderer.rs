use crate::detection::domain::detection::Detection;
use crate::shared::frame::Frame;

/// Domain interface for drawing detections onto a frame.
///
/// Implementations modify the frame in-place. Coordinates in detections
/// are fractions of the frame size, so any frame with the dimensions the
/// detector saw can be annotated, whatever its channel order.
pub trait OverlayRenderer: Send {
    fn render(
        &self,
        frame: &mut Frame,
        detections: &[Detection],
    ) -> Result<(), Box<dyn std::error::Error>>;
}
