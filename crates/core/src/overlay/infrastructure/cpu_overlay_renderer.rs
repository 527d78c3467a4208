use crate::detection::domain::detection::{
    Detection, FaceDetection, HandLandmarks, HAND_CONNECTIONS,
};
use crate::overlay::domain::overlay_renderer::OverlayRenderer;
use crate::shared::frame::Frame;

use super::drawing::{text_size, Color, Painter};

const WHITE: Color = [224, 224, 224];
const RED: Color = [255, 48, 48];
const GREEN: Color = [48, 255, 48];
const BLUE: Color = [21, 101, 192];
const YELLOW: Color = [255, 204, 0];
const GRAY: Color = [128, 128, 128];
const PURPLE: Color = [128, 64, 128];
const PEACH: Color = [255, 229, 180];

const BOX_THICKNESS: i32 = 2;
const KEYPOINT_RADIUS: i32 = 2;
const LABEL_SCALE: i32 = 2;
const LABEL_GAP: i32 = 4;
const CONNECTION_THICKNESS: i32 = 2;
const LANDMARK_RADIUS: i32 = 4;

/// Skeleton group a hand joint or bone belongs to; decides its color.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Finger {
    Palm,
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    /// Wrist and finger bases belong to the palm.
    fn of_joint(joint: usize) -> Self {
        match joint {
            0 | 1 | 5 | 9 | 13 | 17 => Finger::Palm,
            2..=4 => Finger::Thumb,
            6..=8 => Finger::Index,
            10..=12 => Finger::Middle,
            14..=16 => Finger::Ring,
            _ => Finger::Pinky,
        }
    }

    fn of_bone(a: usize, b: usize) -> Self {
        match (Finger::of_joint(a), Finger::of_joint(b)) {
            (Finger::Palm, Finger::Palm) => Finger::Palm,
            (Finger::Palm, other) | (other, _) => other,
        }
    }

    fn joint_color(self) -> Color {
        match self {
            Finger::Palm => RED,
            Finger::Thumb => PEACH,
            Finger::Index => PURPLE,
            Finger::Middle => YELLOW,
            Finger::Ring => GREEN,
            Finger::Pinky => BLUE,
        }
    }

    fn bone_color(self) -> Color {
        match self {
            Finger::Palm => GRAY,
            other => other.joint_color(),
        }
    }
}

/// Draws detections with plain CPU rasterization.
///
/// Faces get a bounding box, their keypoints and a confidence label.
/// Hands get the skeleton colored per finger, then the joints on top.
#[derive(Default)]
pub struct CpuOverlayRenderer;

impl CpuOverlayRenderer {
    pub fn new() -> Self {
        Self
    }

    fn draw_face(&self, painter: &mut Painter<'_>, face: &FaceDetection) {
        let (fw, fh) = painter.dimensions();
        let (x1, y1, x2, y2) = face.bbox.to_pixels(fw, fh);
        let (x1, y1, x2, y2) = (x1 as i32, y1 as i32, x2 as i32, y2 as i32);
        painter.rect((x1, y1), (x2, y2), BOX_THICKNESS, WHITE);

        for kp in &face.keypoints {
            painter.disc(to_pixel(kp.x, kp.y, fw, fh), KEYPOINT_RADIUS, RED);
        }

        let label = confidence_label(face.score);
        let (_, text_h) = text_size(&label, LABEL_SCALE);
        let top = (y1 - LABEL_GAP - text_h).max(0);
        painter.text((x1, top), &label, LABEL_SCALE, GREEN);
    }

    fn draw_hand(&self, painter: &mut Painter<'_>, hand: &HandLandmarks) {
        let (fw, fh) = painter.dimensions();
        let points: Vec<(i32, i32)> = hand
            .landmarks()
            .iter()
            .map(|lm| to_pixel(lm.x, lm.y, fw, fh))
            .collect();

        for &(a, b) in &HAND_CONNECTIONS {
            let color = Finger::of_bone(a, b).bone_color();
            painter.line(points[a], points[b], CONNECTION_THICKNESS, color);
        }
        for (joint, &p) in points.iter().enumerate() {
            painter.disc(p, LANDMARK_RADIUS, WHITE);
            painter.disc(p, LANDMARK_RADIUS - 1, Finger::of_joint(joint).joint_color());
        }
    }
}

impl OverlayRenderer for CpuOverlayRenderer {
    fn render(
        &self,
        frame: &mut Frame,
        detections: &[Detection],
    ) -> Result<(), Box<dyn std::error::Error>> {
        if detections.is_empty() {
            return Ok(());
        }
        let layout = frame.layout();
        frame
            .with_image(|canvas| {
                let mut painter = Painter::new(canvas, layout);
                for detection in detections {
                    match detection {
                        Detection::Face(face) => self.draw_face(&mut painter, face),
                        Detection::Hand(hand) => self.draw_hand(&mut painter, hand),
                    }
                }
            })
            .ok_or_else(|| "frame data does not match its dimensions".into())
    }
}

/// Points far outside the frame are pulled in to one frame size past the
/// edge, which keeps line rasterization bounded.
fn to_pixel(x: f32, y: f32, frame_width: u32, frame_height: u32) -> (i32, i32) {
    let (fw, fh) = (frame_width as f32, frame_height as f32);
    (
        (x * fw).round().clamp(-fw, 2.0 * fw) as i32,
        (y * fh).round().clamp(-fh, 2.0 * fh) as i32,
    )
}

/// Score as a percentage with two decimals, e.g. `93.51%`.
fn confidence_label(score: f32) -> String {
    format!("{:.2}%", score * 100.0)
}
