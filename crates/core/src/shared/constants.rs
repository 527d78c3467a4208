pub const FACE_SHORT_RANGE_MODEL_NAME: &str = "face_detection_short_range.onnx";
pub const FACE_FULL_RANGE_MODEL_NAME: &str = "face_detection_full_range.onnx";
pub const PALM_DETECTION_MODEL_NAME: &str = "palm_detection_full.onnx";
pub const HAND_LANDMARK_MODEL_NAME: &str = "hand_landmark_full.onnx";

/// Short video played by the hand demo when no other source is given.
pub const DEFAULT_HAND_PAGE_URL: &str = "https://www.youtube.com/shorts/WMtG0TPT_XM?feature=share";

/// File played by the face demo when no other source is given.
pub const DEFAULT_FACE_SOURCE_FILE: &str = "face.mp4";

pub const DEFAULT_RESOLVER_PROGRAM: &str = "yt-dlp";

/// Prefer an mp4 rendition, fall back to the best single-file format.
pub const DEFAULT_RESOLVER_FORMAT: &str = "best[ext=mp4]/best";

/// Bounded wait for the cancellation key, which also paces the loop.
pub const DEFAULT_KEY_POLL_MS: u64 = 5;

pub const DEFAULT_DETECTION_CONFIDENCE: f64 = 0.5;
pub const DEFAULT_TRACKING_CONFIDENCE: f64 = 0.5;
pub const DEFAULT_MAX_NUM_HANDS: usize = 2;

pub const FACE_WINDOW_TITLE: &str = "Face Detector";
pub const HAND_WINDOW_TITLE: &str = "Hand Detector";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
