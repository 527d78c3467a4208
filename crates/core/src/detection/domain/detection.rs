/// Number of joints the hand landmark model reports per hand.
pub const HAND_LANDMARK_COUNT: usize = 21;

/// Joint-index pairs forming the hand skeleton: thumb, four fingers, palm.
pub const HAND_CONNECTIONS: [(usize, usize); 21] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 4),
    (0, 5),
    (5, 6),
    (6, 7),
    (7, 8),
    (5, 9),
    (9, 10),
    (10, 11),
    (11, 12),
    (9, 13),
    (13, 14),
    (14, 15),
    (15, 16),
    (13, 17),
    (0, 17),
    (17, 18),
    (18, 19),
    (19, 20),
];

/// Box in fractions of frame width/height. May extend past `[0, 1]`
/// when a face is cut off by the frame edge.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RelativeBoundingBox {
    pub xmin: f32,
    pub ymin: f32,
    pub width: f32,
    pub height: f32,
}

impl RelativeBoundingBox {
    /// Pixel rectangle `(x1, y1, x2, y2)` clamped to the frame.
    pub fn to_pixels(&self, frame_width: u32, frame_height: u32) -> (i64, i64, i64, i64) {
        let fw = frame_width as f32;
        let fh = frame_height as f32;
        let x1 = (self.xmin * fw).round().clamp(0.0, fw - 1.0);
        let y1 = (self.ymin * fh).round().clamp(0.0, fh - 1.0);
        let x2 = ((self.xmin + self.width) * fw).round().clamp(0.0, fw - 1.0);
        let y2 = ((self.ymin + self.height) * fh).round().clamp(0.0, fh - 1.0);
        (x1 as i64, y1 as i64, x2 as i64, y2 as i64)
    }
}

/// A point in fractions of frame width/height.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NormalizedPoint {
    pub x: f32,
    pub y: f32,
}

/// Joint position: `x`/`y` in fractions of frame size, `z` is depth
/// relative to the wrist, on roughly the same scale as `x`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NormalizedLandmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FaceDetection {
    pub bbox: RelativeBoundingBox,
    pub score: f32,
    /// Right eye, left eye, nose tip, mouth, right ear, left ear.
    pub keypoints: Vec<NormalizedPoint>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HandLandmarks {
    landmarks: [NormalizedLandmark; HAND_LANDMARK_COUNT],
    pub handedness: Handedness,
    pub score: f32,
}

impl HandLandmarks {
    pub fn new(
        landmarks: [NormalizedLandmark; HAND_LANDMARK_COUNT],
        handedness: Handedness,
        score: f32,
    ) -> Self {
        Self {
            landmarks,
            handedness,
            score,
        }
    }

    pub fn landmarks(&self) -> &[NormalizedLandmark; HAND_LANDMARK_COUNT] {
        &self.landmarks
    }
}

/// One result produced by a detector for one frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Detection {
    Face(FaceDetection),
    Hand(HandLandmarks),
}
