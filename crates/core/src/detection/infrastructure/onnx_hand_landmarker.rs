//! Two-stage hand landmark detector.
//!
//! A palm detector finds hands in the whole frame; each palm becomes a
//! rotated square region that the landmark model turns into 21 joints.
//! Regions for the next frame are derived from the joints, so palm
//! detection only runs while fewer than `max_num_hands` hands are tracked.

use std::f32::consts::FRAC_PI_2;
use std::path::Path;

use ort::session::Session;

use super::math::{
    bbox_iou, generate_anchors, nms, normalize_radians, sigmoid, AnchorSpec, Scored,
};
use super::session::{input_layout, load_session, regressors_and_scores, run, ModelOutput};
use super::tensor::{
    crop_tensor, letterbox_tensor, FloatRange, Letterbox, RotatedRect, TensorLayout,
};
use crate::detection::domain::detection::{
    Detection, HandLandmarks, Handedness, NormalizedLandmark, HAND_LANDMARK_COUNT,
};
use crate::detection::domain::detector::Detector;
use crate::shared::config::HandLandmarkerOptions;
use crate::shared::frame::Frame;

const PALM_INPUT_SIZE: u32 = 192;
const PALM_STRIDES: [u32; 4] = [8, 16, 16, 16];
/// Box (4 values) plus 7 palm keypoints (2 values each).
const PALM_REGRESSOR_WIDTH: usize = 18;
const PALM_KEYPOINT_COUNT: usize = 7;
const PALM_NMS_IOU_THRESH: f32 = 0.3;

const LANDMARK_INPUT_SIZE: u32 = 224;
const LANDMARK_VALUES: usize = HAND_LANDMARK_COUNT * 3;

/// Region tuning when cropping from a palm detection.
const PALM_ROI_SCALE: f32 = 2.6;
const PALM_ROI_SHIFT_Y: f32 = -0.5;
/// Region tuning when cropping from the previous frame's landmarks.
const LANDMARK_ROI_SCALE: f32 = 2.0;
const LANDMARK_ROI_SHIFT_Y: f32 = -0.1;

/// Regions overlapping more than this are treated as the same hand.
const SAME_HAND_IOU: f32 = 0.5;

const WRIST: usize = 0;
const PALM_MIDDLE_FINGER_KEYPOINT: usize = 2;
const MIDDLE_FINGER_MCP: usize = 9;

/// Hand landmark detector backed by two ONNX Runtime sessions.
pub struct OnnxHandLandmarker {
    palm_session: Option<Session>,
    palm_layout: TensorLayout,
    landmark_session: Option<Session>,
    landmark_layout: TensorLayout,
    palm_anchors: Vec<[f32; 2]>,
    options: HandLandmarkerOptions,
    tracked: Vec<RotatedRect>,
}

impl OnnxHandLandmarker {
    pub fn new(
        palm_model_path: &Path,
        landmark_model_path: &Path,
        options: HandLandmarkerOptions,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let palm_session = load_session(palm_model_path)?;
        let landmark_session = load_session(landmark_model_path)?;
        let palm_anchors = generate_anchors(&AnchorSpec {
            input_size: PALM_INPUT_SIZE,
            strides: &PALM_STRIDES,
            interpolated_scale: true,
        });
        log::info!(
            "Hand landmarker ready (max {} hands, detection >= {}, tracking >= {})",
            options.max_num_hands,
            options.min_detection_confidence,
            options.min_tracking_confidence
        );
        Ok(Self {
            palm_layout: input_layout(&palm_session),
            palm_session: Some(palm_session),
            landmark_layout: input_layout(&landmark_session),
            landmark_session: Some(landmark_session),
            palm_anchors,
            options,
            tracked: Vec::new(),
        })
    }
}

impl Detector for OnnxHandLandmarker {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
        let (Some(palm_session), Some(landmark_session)) =
            (self.palm_session.as_mut(), self.landmark_session.as_mut())
        else {
            return Err("hand landmarker has been closed".into());
        };
        let fw = frame.width() as f32;
        let fh = frame.height() as f32;
        let max_hands = self.options.max_num_hands;

        let mut rois = std::mem::take(&mut self.tracked);
        if needs_palm_pass(rois.len(), max_hands) {
            let (tensor, letterbox) =
                letterbox_tensor(frame, PALM_INPUT_SIZE, FloatRange::UNIT, self.palm_layout)?;
            let outputs = run(palm_session, tensor)?;
            let palms = decode_palms(
                &outputs,
                &self.palm_anchors,
                &letterbox,
                self.options.min_detection_confidence as f32,
                fw,
                fh,
            )?;
            rois = merge_palm_rois(rois, palms.iter().map(palm_to_roi), max_hands);
        }

        let mut results = Vec::with_capacity(rois.len());
        for roi in rois {
            let tensor = crop_tensor(
                frame,
                &roi,
                LANDMARK_INPUT_SIZE,
                FloatRange::UNIT,
                self.landmark_layout,
            )?;
            let outputs = run(landmark_session, tensor)?;
            results.push((roi, parse_landmark_outputs(&outputs)?));
        }

        let (hands, next_rois) = track_hands(
            results,
            self.options.min_tracking_confidence as f32,
            max_hands,
            fw,
            fh,
        );
        self.tracked = next_rois;
        Ok(hands.into_iter().map(Detection::Hand).collect())
    }

    fn close(&mut self) {
        self.tracked.clear();
        let palm = self.palm_session.take();
        let landmark = self.landmark_session.take();
        if palm.is_some() || landmark.is_some() {
            log::debug!("Hand landmarker sessions released");
        }
    }
}

// ---------------------------------------------------------------------------
// Palm detection
// ---------------------------------------------------------------------------

/// A detected palm in frame pixels.
#[derive(Clone, Debug)]
struct Palm {
    cx: f32,
    cy: f32,
    w: f32,
    h: f32,
    keypoints: [[f32; 2]; PALM_KEYPOINT_COUNT],
    score: f32,
}

impl Scored for Palm {
    fn score(&self) -> f32 {
        self.score
    }

    fn corners(&self) -> [f32; 4] {
        [
            self.cx - self.w / 2.0,
            self.cy - self.h / 2.0,
            self.cx + self.w / 2.0,
            self.cy + self.h / 2.0,
        ]
    }
}

/// Decodes palm candidates, best first.
fn decode_palms(
    outputs: &[ModelOutput],
    anchors: &[[f32; 2]],
    letterbox: &Letterbox,
    min_confidence: f32,
    frame_width: f32,
    frame_height: f32,
) -> Result<Vec<Palm>, Box<dyn std::error::Error>> {
    let (reg_data, score_data) =
        regressors_and_scores(outputs, PALM_REGRESSOR_WIDTH, anchors.len())?;
    let size = PALM_INPUT_SIZE as f32;
    let to_pixels = |x: f32, y: f32| {
        let (nx, ny) = letterbox.unpad_point(x, y);
        [nx * frame_width, ny * frame_height]
    };

    let mut candidates = Vec::new();
    for (i, anchor) in anchors.iter().enumerate() {
        let score = sigmoid(score_data[i]);
        if score < min_confidence {
            continue;
        }
        let r = &reg_data[i * PALM_REGRESSOR_WIDTH..(i + 1) * PALM_REGRESSOR_WIDTH];
        let [cx, cy] = to_pixels(anchor[0] + r[0] / size, anchor[1] + r[1] / size);
        let (nw, nh) = letterbox.unpad_size(r[2] / size, r[3] / size);
        let mut keypoints = [[0.0; 2]; PALM_KEYPOINT_COUNT];
        for (k, kp) in keypoints.iter_mut().enumerate() {
            *kp = to_pixels(
                anchor[0] + r[4 + 2 * k] / size,
                anchor[1] + r[5 + 2 * k] / size,
            );
        }
        candidates.push(Palm {
            cx,
            cy,
            w: nw * frame_width,
            h: nh * frame_height,
            keypoints,
            score,
        });
    }

    Ok(nms(&mut candidates, PALM_NMS_IOU_THRESH))
}

/// Rotation that makes the segment `from → to` point straight up.
fn upright_rotation(from: [f32; 2], to: [f32; 2]) -> f32 {
    normalize_radians(FRAC_PI_2 - (-(to[1] - from[1])).atan2(to[0] - from[0]))
}

/// Shifts, squares and scales a rotated box into a crop region.
fn expand_roi(
    cx: f32,
    cy: f32,
    w: f32,
    h: f32,
    rotation: f32,
    scale: f32,
    shift_y: f32,
) -> RotatedRect {
    let (sin, cos) = rotation.sin_cos();
    RotatedRect {
        center_x: cx - h * shift_y * sin,
        center_y: cy + h * shift_y * cos,
        size: w.max(h) * scale,
        rotation,
    }
}

fn palm_to_roi(palm: &Palm) -> RotatedRect {
    let rotation = upright_rotation(
        palm.keypoints[WRIST],
        palm.keypoints[PALM_MIDDLE_FINGER_KEYPOINT],
    );
    expand_roi(
        palm.cx,
        palm.cy,
        palm.w,
        palm.h,
        rotation,
        PALM_ROI_SCALE,
        PALM_ROI_SHIFT_Y,
    )
}

// ---------------------------------------------------------------------------
// Landmarks
// ---------------------------------------------------------------------------

/// Landmark model output for one region.
#[derive(Clone, Debug)]
struct RawHand {
    /// `(x, y, z)` in model input pixels.
    landmarks: [[f32; 3]; HAND_LANDMARK_COUNT],
    presence: f32,
    right_probability: f32,
}

/// Scores arrive either as probabilities or as logits, depending on how
/// the model was converted.
fn as_probability(value: f32) -> f32 {
    if (0.0..=1.0).contains(&value) {
        value
    } else {
        sigmoid(value)
    }
}

fn parse_landmark_outputs(outputs: &[ModelOutput]) -> Result<RawHand, Box<dyn std::error::Error>> {
    let coords = outputs
        .iter()
        .find(|o| o.data.len() == LANDMARK_VALUES)
        .ok_or("hand landmark model produced no 21x3 landmark output")?;
    let mut scalars = outputs.iter().filter(|o| o.data.len() == 1);
    let presence = scalars
        .next()
        .ok_or("hand landmark model produced no presence score")?;
    let right_probability = scalars.next().map_or(0.5, |o| as_probability(o.data[0]));

    let mut landmarks = [[0.0; 3]; HAND_LANDMARK_COUNT];
    for (lm, chunk) in landmarks.iter_mut().zip(coords.data.chunks_exact(3)) {
        lm.copy_from_slice(chunk);
    }
    Ok(RawHand {
        landmarks,
        presence: as_probability(presence.data[0]),
        right_probability,
    })
}

/// Maps landmark x/y from the crop back to frame pixels.
fn project_landmarks(raw: &RawHand, roi: &RotatedRect) -> [[f32; 2]; HAND_LANDMARK_COUNT] {
    let size = LANDMARK_INPUT_SIZE as f32;
    let mut pixels = [[0.0; 2]; HAND_LANDMARK_COUNT];
    for (px, lm) in pixels.iter_mut().zip(raw.landmarks.iter()) {
        let (x, y) = roi.to_frame(lm[0] / size, lm[1] / size);
        *px = [x, y];
    }
    pixels
}

/// Crop region for the next frame, from this frame's joints.
fn landmarks_to_roi(pixels: &[[f32; 2]; HAND_LANDMARK_COUNT]) -> RotatedRect {
    let rotation = upright_rotation(pixels[WRIST], pixels[MIDDLE_FINGER_MCP]);
    let (sin, cos) = rotation.sin_cos();

    // Bounding box in a frame rotated with the hand.
    let mut min = [f32::MAX; 2];
    let mut max = [f32::MIN; 2];
    for p in pixels {
        let rx = p[0] * cos + p[1] * sin;
        let ry = -p[0] * sin + p[1] * cos;
        min[0] = min[0].min(rx);
        min[1] = min[1].min(ry);
        max[0] = max[0].max(rx);
        max[1] = max[1].max(ry);
    }
    let rcx = (min[0] + max[0]) / 2.0;
    let rcy = (min[1] + max[1]) / 2.0;
    let cx = rcx * cos - rcy * sin;
    let cy = rcx * sin + rcy * cos;

    expand_roi(
        cx,
        cy,
        max[0] - min[0],
        max[1] - min[1],
        rotation,
        LANDMARK_ROI_SCALE,
        LANDMARK_ROI_SHIFT_Y,
    )
}

fn to_hand(
    raw: &RawHand,
    pixels: &[[f32; 2]; HAND_LANDMARK_COUNT],
    roi: &RotatedRect,
    frame_width: f32,
    frame_height: f32,
) -> HandLandmarks {
    // depth is reported in crop pixels; scale it like x
    let z_scale = roi.size / (LANDMARK_INPUT_SIZE as f32 * frame_width);
    let mut landmarks = [NormalizedLandmark::default(); HAND_LANDMARK_COUNT];
    for ((lm, px), raw_lm) in landmarks.iter_mut().zip(pixels).zip(raw.landmarks.iter()) {
        *lm = NormalizedLandmark {
            x: px[0] / frame_width,
            y: px[1] / frame_height,
            z: raw_lm[2] * z_scale,
        };
    }
    let handedness = if raw.right_probability > 0.5 {
        Handedness::Right
    } else {
        Handedness::Left
    };
    HandLandmarks::new(landmarks, handedness, raw.presence)
}

/// Keeps the best-scoring hand among overlapping regions, up to `max`.
fn dedupe_hands(
    mut found: Vec<(HandLandmarks, RotatedRect)>,
    max: usize,
) -> Vec<(HandLandmarks, RotatedRect)> {
    found.sort_by(|a, b| {
        b.0.score
            .partial_cmp(&a.0.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut kept: Vec<(HandLandmarks, RotatedRect)> = Vec::new();
    for (hand, roi) in found {
        if kept.len() >= max {
            break;
        }
        let duplicate = kept
            .iter()
            .any(|(_, k)| bbox_iou(&k.bounds(), &roi.bounds()) > SAME_HAND_IOU);
        if !duplicate {
            kept.push((hand, roi));
        }
    }
    kept
}

// ---------------------------------------------------------------------------
// Tracking
// ---------------------------------------------------------------------------

/// Palm detection only runs while there is room for another hand.
fn needs_palm_pass(tracked: usize, max_hands: usize) -> bool {
    tracked < max_hands
}

/// Appends palm regions, best first, until `max_hands` regions are held.
/// A palm overlapping an already tracked region is that same hand.
fn merge_palm_rois(
    mut rois: Vec<RotatedRect>,
    palms: impl IntoIterator<Item = RotatedRect>,
    max_hands: usize,
) -> Vec<RotatedRect> {
    let tracked_count = rois.len();
    for palm in palms {
        if rois.len() >= max_hands {
            break;
        }
        let overlaps = rois[..tracked_count]
            .iter()
            .any(|t| bbox_iou(&t.bounds(), &palm.bounds()) > SAME_HAND_IOU);
        if !overlaps {
            rois.push(palm);
        }
    }
    rois
}

fn keeps_tracking(presence: f32, min_tracking_confidence: f32) -> bool {
    presence >= min_tracking_confidence
}

/// Turns per-region landmark results into the hands to report and the
/// regions to crop next frame. Results below `min_tracking_confidence`
/// are dropped, which also ends tracking for that region.
fn track_hands(
    results: Vec<(RotatedRect, RawHand)>,
    min_tracking_confidence: f32,
    max_hands: usize,
    frame_width: f32,
    frame_height: f32,
) -> (Vec<HandLandmarks>, Vec<RotatedRect>) {
    let mut found = Vec::new();
    for (roi, raw) in results {
        if !keeps_tracking(raw.presence, min_tracking_confidence) {
            log::debug!("Hand lost (presence {:.2})", raw.presence);
            continue;
        }
        let pixels = project_landmarks(&raw, &roi);
        let next_roi = landmarks_to_roi(&pixels);
        found.push((to_hand(&raw, &pixels, &roi, frame_width, frame_height), next_roi));
    }
    dedupe_hands(found, max_hands).into_iter().unzip()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
