use std::path::PathBuf;

use crate::detection::domain::detector::Detector;
use crate::shared::config::{DetectorConfig, FaceModel, ModelConfig};
use crate::shared::constants::{
    FACE_FULL_RANGE_MODEL_NAME, FACE_SHORT_RANGE_MODEL_NAME, HAND_LANDMARK_MODEL_NAME,
    PALM_DETECTION_MODEL_NAME,
};

use super::model_resolver::{self, ProgressFn};
use super::onnx_blazeface_detector::OnnxBlazefaceDetector;
use super::onnx_hand_landmarker::OnnxHandLandmarker;

/// Model files a detector configuration needs, in load order.
pub fn required_models(config: &DetectorConfig) -> Vec<&'static str> {
    match config {
        DetectorConfig::Face(opts) => vec![face_model_name(opts.model_selection)],
        DetectorConfig::Hand(_) => vec![PALM_DETECTION_MODEL_NAME, HAND_LANDMARK_MODEL_NAME],
    }
}

fn face_model_name(model: FaceModel) -> &'static str {
    match model {
        FaceModel::ShortRange => FACE_SHORT_RANGE_MODEL_NAME,
        FaceModel::FullRange => FACE_FULL_RANGE_MODEL_NAME,
    }
}

/// Resolves the model files for `config` and builds the detector.
///
/// `progress` is called with `(bytes_downloaded, total_bytes)` for every
/// model that has to be downloaded.
pub fn create_detector(
    config: &DetectorConfig,
    models: &ModelConfig,
    progress: Option<fn(u64, u64)>,
) -> Result<Box<dyn Detector>, Box<dyn std::error::Error>> {
    let mut paths = Vec::new();
    for name in required_models(config) {
        log::info!("Resolving model: {name}");
        let callback = progress.map(|f| Box::new(f) as ProgressFn);
        paths.push(model_resolver::resolve(name, models, callback)?);
    }
    build_detector(config, &paths)
}

/// Builds the detector from model files already on disk, given in
/// [`required_models`] order.
pub fn build_detector(
    config: &DetectorConfig,
    paths: &[PathBuf],
) -> Result<Box<dyn Detector>, Box<dyn std::error::Error>> {
    match (config, paths) {
        (DetectorConfig::Face(opts), [model]) => Ok(Box::new(OnnxBlazefaceDetector::new(
            model,
            opts.model_selection,
            opts.min_detection_confidence,
        )?)),
        (DetectorConfig::Hand(opts), [palm, landmark]) => Ok(Box::new(OnnxHandLandmarker::new(
            palm,
            landmark,
            opts.clone(),
        )?)),
        _ => Err("detector configuration resolved an unexpected number of models".into()),
    }
}
