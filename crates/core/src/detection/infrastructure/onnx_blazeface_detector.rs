/// BlazeFace face detector using ONNX Runtime via `ort`.
///
/// Supports the short-range (128×128, faces within ~2 m) and full-range
/// (192×192, faces within ~5 m) models. Stateless across frames: every
/// call runs the detector on the whole frame.
use std::path::Path;

use ort::session::Session;

use super::math::{generate_anchors, nms, sigmoid, AnchorSpec, Scored};
use super::session::{input_layout, load_session, regressors_and_scores, run, ModelOutput};
use super::tensor::{letterbox_tensor, FloatRange, Letterbox, TensorLayout};
use crate::detection::domain::detection::{
    Detection, FaceDetection, NormalizedPoint, RelativeBoundingBox,
};
use crate::detection::domain::detector::Detector;
use crate::shared::config::FaceModel;
use crate::shared::frame::Frame;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f32 = 0.3;

/// Box (4 values) plus 6 keypoints (2 values each).
const REGRESSOR_WIDTH: usize = 16;

const KEYPOINT_COUNT: usize = 6;

/// Input size and anchor layout of one BlazeFace variant.
struct ModelGeometry {
    input_size: u32,
    anchors: Vec<[f32; 2]>,
}

impl ModelGeometry {
    fn for_model(model: FaceModel) -> Self {
        let spec = match model {
            FaceModel::ShortRange => AnchorSpec {
                input_size: 128,
                strides: &[8, 16, 16, 16],
                interpolated_scale: true,
            },
            FaceModel::FullRange => AnchorSpec {
                input_size: 192,
                strides: &[4],
                interpolated_scale: false,
            },
        };
        Self {
            input_size: spec.input_size,
            anchors: generate_anchors(&spec),
        }
    }
}

/// BlazeFace face detector backed by an ONNX Runtime session.
pub struct OnnxBlazefaceDetector {
    session: Option<Session>,
    layout: TensorLayout,
    geometry: ModelGeometry,
    min_confidence: f32,
}

impl OnnxBlazefaceDetector {
    /// Load a BlazeFace ONNX model of the given variant.
    pub fn new(
        model_path: &Path,
        model: FaceModel,
        min_confidence: f64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session = load_session(model_path)?;
        let layout = input_layout(&session);
        let geometry = ModelGeometry::for_model(model);
        log::info!(
            "Face detector ready ({:?}, {}x{} input, {} anchors)",
            model,
            geometry.input_size,
            geometry.input_size,
            geometry.anchors.len()
        );
        Ok(Self {
            session: Some(session),
            layout,
            geometry,
            min_confidence: min_confidence as f32,
        })
    }
}

impl Detector for OnnxBlazefaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
        let session = self
            .session
            .as_mut()
            .ok_or("face detector has been closed")?;

        let (tensor, letterbox) = letterbox_tensor(
            frame,
            self.geometry.input_size,
            FloatRange::SIGNED,
            self.layout,
        )?;
        let outputs = run(session, tensor)?;

        let faces = decode_faces(
            &outputs,
            &self.geometry.anchors,
            self.geometry.input_size,
            &letterbox,
            self.min_confidence,
        )?;
        Ok(faces.into_iter().map(Detection::Face).collect())
    }

    fn close(&mut self) {
        if self.session.take().is_some() {
            log::debug!("Face detector session released");
        }
    }
}

// ---------------------------------------------------------------------------
// Postprocessing
// ---------------------------------------------------------------------------

/// Candidate in normalized model-input coordinates.
#[derive(Clone, Debug)]
struct Candidate {
    cx: f32,
    cy: f32,
    w: f32,
    h: f32,
    keypoints: [[f32; 2]; KEYPOINT_COUNT],
    score: f32,
}

impl Scored for Candidate {
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

fn decode_faces(
    outputs: &[ModelOutput],
    anchors: &[[f32; 2]],
    input_size: u32,
    letterbox: &Letterbox,
    min_confidence: f32,
) -> Result<Vec<FaceDetection>, Box<dyn std::error::Error>> {
    let (reg_data, score_data) = regressors_and_scores(outputs, REGRESSOR_WIDTH, anchors.len())?;
    let size = input_size as f32;

    let mut candidates = Vec::new();
    for (i, anchor) in anchors.iter().enumerate() {
        let score = sigmoid(score_data[i]);
        if score < min_confidence {
            continue;
        }
        let r = &reg_data[i * REGRESSOR_WIDTH..(i + 1) * REGRESSOR_WIDTH];
        let mut keypoints = [[0.0; 2]; KEYPOINT_COUNT];
        for (k, kp) in keypoints.iter_mut().enumerate() {
            kp[0] = anchor[0] + r[4 + 2 * k] / size;
            kp[1] = anchor[1] + r[5 + 2 * k] / size;
        }
        candidates.push(Candidate {
            cx: anchor[0] + r[0] / size,
            cy: anchor[1] + r[1] / size,
            w: r[2] / size,
            h: r[3] / size,
            keypoints,
            score,
        });
    }

    let kept = nms(&mut candidates, NMS_IOU_THRESH);
    Ok(kept.iter().map(|c| to_frame_space(c, letterbox)).collect())
}

fn to_frame_space(c: &Candidate, letterbox: &Letterbox) -> FaceDetection {
    let (cx, cy) = letterbox.unpad_point(c.cx, c.cy);
    let (w, h) = letterbox.unpad_size(c.w, c.h);
    let keypoints = c
        .keypoints
        .iter()
        .map(|kp| {
            let (x, y) = letterbox.unpad_point(kp[0], kp[1]);
            NormalizedPoint { x, y }
        })
        .collect();
    FaceDetection {
        bbox: RelativeBoundingBox {
            xmin: cx - w / 2.0,
            ymin: cy - h / 2.0,
            width: w,
            height: h,
        },
        score: c.score,
        keypoints,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
