use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::constants::{
    DEFAULT_DETECTION_CONFIDENCE, DEFAULT_HAND_PAGE_URL, DEFAULT_KEY_POLL_MS,
    DEFAULT_MAX_NUM_HANDS, DEFAULT_RESOLVER_FORMAT, DEFAULT_RESOLVER_PROGRAM,
    DEFAULT_TRACKING_CONFIDENCE, FACE_WINDOW_TITLE, HAND_WINDOW_TITLE,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{name} must be between 0.0 and 1.0, got {value}")]
    ConfidenceOutOfRange { name: &'static str, value: f64 },
    #[error("max_num_hands must be at least 1")]
    NoHandsAllowed,
    #[error("key_poll_ms must be at least 1")]
    ZeroKeyPoll,
}

/// Face model variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FaceModel {
    /// Faces within ~2 m of the camera.
    ShortRange,
    /// Faces up to ~5 m away.
    FullRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceDetectorOptions {
    pub model_selection: FaceModel,
    pub min_detection_confidence: f64,
}

impl Default for FaceDetectorOptions {
    fn default() -> Self {
        Self {
            model_selection: FaceModel::FullRange,
            min_detection_confidence: DEFAULT_DETECTION_CONFIDENCE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandLandmarkerOptions {
    pub max_num_hands: usize,
    pub min_detection_confidence: f64,
    pub min_tracking_confidence: f64,
}

impl Default for HandLandmarkerOptions {
    fn default() -> Self {
        Self {
            max_num_hands: DEFAULT_MAX_NUM_HANDS,
            min_detection_confidence: DEFAULT_DETECTION_CONFIDENCE,
            min_tracking_confidence: DEFAULT_TRACKING_CONFIDENCE,
        }
    }
}

/// Which detector a run uses. Fixed for the lifetime of the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DetectorConfig {
    Face(FaceDetectorOptions),
    Hand(HandLandmarkerOptions),
}

impl Default for DetectorConfig {
    fn default() -> Self {
        DetectorConfig::Face(FaceDetectorOptions::default())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory checked for model files after the user cache.
    pub model_dir: Option<PathBuf>,
    /// Models missing locally are fetched from `<base>/<file name>`.
    pub download_base_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub program: String,
    pub format: String,
    pub page_url: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_RESOLVER_PROGRAM.to_string(),
            format: DEFAULT_RESOLVER_FORMAT.to_string(),
            page_url: DEFAULT_HAND_PAGE_URL.to_string(),
        }
    }
}

/// Everything a live-view run needs besides the source itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveViewConfig {
    pub mirror: bool,
    pub key_poll_ms: u64,
    /// Defaults to a title matching the detector kind.
    pub window_title: Option<String>,
    pub detector: DetectorConfig,
    pub models: ModelConfig,
    pub resolver: ResolverConfig,
}

impl Default for LiveViewConfig {
    fn default() -> Self {
        Self {
            mirror: true,
            key_poll_ms: DEFAULT_KEY_POLL_MS,
            window_title: None,
            detector: DetectorConfig::default(),
            models: ModelConfig::default(),
            resolver: ResolverConfig::default(),
        }
    }
}

impl LiveViewConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key_poll_ms == 0 {
            return Err(ConfigError::ZeroKeyPoll);
        }
        match &self.detector {
            DetectorConfig::Face(opts) => {
                check_confidence("min_detection_confidence", opts.min_detection_confidence)
            }
            DetectorConfig::Hand(opts) => {
                if opts.max_num_hands == 0 {
                    return Err(ConfigError::NoHandsAllowed);
                }
                check_confidence("min_detection_confidence", opts.min_detection_confidence)?;
                check_confidence("min_tracking_confidence", opts.min_tracking_confidence)
            }
        }
    }

    pub fn key_poll(&self) -> Duration {
        Duration::from_millis(self.key_poll_ms)
    }

    pub fn window_title(&self) -> &str {
        match (&self.window_title, &self.detector) {
            (Some(title), _) => title,
            (None, DetectorConfig::Face(_)) => FACE_WINDOW_TITLE,
            (None, DetectorConfig::Hand(_)) => HAND_WINDOW_TITLE,
        }
    }
}

fn check_confidence(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::ConfidenceOutOfRange { name, value })
    }
}
