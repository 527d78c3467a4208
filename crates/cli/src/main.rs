use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;

use visionloop_core::detection::infrastructure::detector_factory::create_detector;
use visionloop_core::display::infrastructure::minifb_display::MinifbDisplay;
use visionloop_core::overlay::infrastructure::cpu_overlay_renderer::CpuOverlayRenderer;
use visionloop_core::pipeline::live_view_use_case::{LiveViewUseCase, LoopState, RunReport};
use visionloop_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use visionloop_core::shared::config::{
    DetectorConfig, FaceDetectorOptions, FaceModel, HandLandmarkerOptions, LiveViewConfig,
};
use visionloop_core::shared::constants::DEFAULT_FACE_SOURCE_FILE;
use visionloop_core::shared::source::SourceSpec;
use visionloop_core::video::domain::stream_resolver::StreamResolver;
use visionloop_core::video::infrastructure::source_factory::AutoFrameSource;
use visionloop_core::video::infrastructure::yt_dlp_resolver::YtDlpResolver;

/// Live face and hand landmark overlays for files, cameras and streams.
#[derive(Parser)]
#[command(name = "visionloop")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Detect faces (default source: face.mp4).
    Face(FaceArgs),
    /// Track hand landmarks (default source: the configured video page).
    Hand(HandArgs),
}

#[derive(Args)]
#[group(multiple = false)]
struct SourceArgs {
    /// Video or image file.
    #[arg(long)]
    file: Option<PathBuf>,

    /// Camera device index.
    #[arg(long)]
    device: Option<u32>,

    /// Direct media URL.
    #[arg(long)]
    stream: Option<String>,
}

#[derive(Args)]
struct CommonArgs {
    /// JSON configuration file; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory searched for model files.
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Show frames as captured instead of mirrored.
    #[arg(long)]
    no_mirror: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum FaceModelArg {
    ShortRange,
    FullRange,
}

impl From<FaceModelArg> for FaceModel {
    fn from(arg: FaceModelArg) -> Self {
        match arg {
            FaceModelArg::ShortRange => FaceModel::ShortRange,
            FaceModelArg::FullRange => FaceModel::FullRange,
        }
    }
}

#[derive(Args)]
struct FaceArgs {
    #[command(flatten)]
    source: SourceArgs,

    #[command(flatten)]
    common: CommonArgs,

    /// Minimum face detection confidence (0.0-1.0).
    #[arg(long)]
    confidence: Option<f64>,

    /// Face model variant.
    #[arg(long, value_enum)]
    model: Option<FaceModelArg>,
}

#[derive(Args)]
struct HandArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Video page URL resolved through yt-dlp.
    #[arg(long, conflicts_with_all = ["file", "device", "stream"])]
    page: Option<String>,

    #[command(flatten)]
    common: CommonArgs,

    /// Maximum number of hands to track.
    #[arg(long)]
    max_hands: Option<usize>,

    /// Minimum palm detection confidence (0.0-1.0).
    #[arg(long)]
    detection_confidence: Option<f64>,

    /// Minimum landmark tracking confidence (0.0-1.0).
    #[arg(long)]
    tracking_confidence: Option<f64>,
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(report) => log::info!("{}", describe(&report)),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<RunReport, Box<dyn std::error::Error>> {
    let (config, spec) = prepare(cli.command)?;
    config.validate()?;

    let detector = create_detector(&config.detector, &config.models, Some(download_progress))?;
    let resolver: Box<dyn StreamResolver> = Box::new(YtDlpResolver::new(&config.resolver));

    let use_case = LiveViewUseCase::new(
        Some(resolver),
        Box::new(AutoFrameSource::new()),
        detector,
        Box::new(CpuOverlayRenderer::new()),
        Box::new(MinifbDisplay::new(config.window_title())),
        Box::new(StdoutPipelineLogger::default()),
        config.mirror,
        config.key_poll(),
    );
    Ok(use_case.execute(&spec)?)
}

/// Merges config file and flags into the run configuration and source.
fn prepare(command: Command) -> Result<(LiveViewConfig, SourceSpec), Box<dyn std::error::Error>> {
    match command {
        Command::Face(args) => {
            let mut config = load_config(&args.common)?;
            let mut opts = match config.detector {
                DetectorConfig::Face(opts) => opts,
                DetectorConfig::Hand(_) => FaceDetectorOptions::default(),
            };
            if let Some(confidence) = args.confidence {
                opts.min_detection_confidence = confidence;
            }
            if let Some(model) = args.model {
                opts.model_selection = model.into();
            }
            config.detector = DetectorConfig::Face(opts);

            let spec = source_spec(&args.source)
                .unwrap_or_else(|| SourceSpec::File(PathBuf::from(DEFAULT_FACE_SOURCE_FILE)));
            Ok((config, spec))
        }
        Command::Hand(args) => {
            let mut config = load_config(&args.common)?;
            let mut opts = match config.detector {
                DetectorConfig::Hand(opts) => opts,
                DetectorConfig::Face(_) => HandLandmarkerOptions::default(),
            };
            if let Some(max_hands) = args.max_hands {
                opts.max_num_hands = max_hands;
            }
            if let Some(confidence) = args.detection_confidence {
                opts.min_detection_confidence = confidence;
            }
            if let Some(confidence) = args.tracking_confidence {
                opts.min_tracking_confidence = confidence;
            }
            config.detector = DetectorConfig::Hand(opts);

            let spec = match args.page {
                Some(page_url) => SourceSpec::Page(page_url),
                None => source_spec(&args.source)
                    .unwrap_or_else(|| SourceSpec::Page(config.resolver.page_url.clone())),
            };
            Ok((config, spec))
        }
    }
}

fn load_config(common: &CommonArgs) -> Result<LiveViewConfig, Box<dyn std::error::Error>> {
    let mut config = match &common.config {
        Some(path) => LiveViewConfig::load(path)?,
        None => LiveViewConfig::default(),
    };
    if let Some(dir) = &common.model_dir {
        config.models.model_dir = Some(dir.clone());
    }
    if common.no_mirror {
        config.mirror = false;
    }
    Ok(config)
}

fn source_spec(args: &SourceArgs) -> Option<SourceSpec> {
    if let Some(path) = &args.file {
        Some(SourceSpec::File(path.clone()))
    } else if let Some(index) = args.device {
        Some(SourceSpec::Device(index))
    } else {
        args.stream.clone().map(SourceSpec::Stream)
    }
}

fn describe(report: &RunReport) -> String {
    let frames = report.frames_processed;
    match &report.final_state {
        LoopState::Exhausted => format!("Source ended after {frames} frames"),
        LoopState::Failed { reason } => format!("Stopped after {frames} frames: {reason}"),
        LoopState::Cancelled | LoopState::Running => {
            format!("Stopped by user after {frames} frames")
        }
    }
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading model... {pct}%");
        if downloaded >= total {
            eprintln!();
        }
    } else {
        eprint!("\rDownloading model... {downloaded} bytes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use visionloop_core::shared::constants::DEFAULT_HAND_PAGE_URL;

    fn prepare_args(args: &[&str]) -> (LiveViewConfig, SourceSpec) {
        let cli = Cli::try_parse_from(args).unwrap();
        prepare(cli.command).unwrap()
    }

    #[test]
    fn test_face_defaults_to_local_file() {
        let (config, spec) = prepare_args(&["visionloop", "face"]);
        assert_eq!(spec, SourceSpec::File(PathBuf::from("face.mp4")));
        assert!(config.mirror);
        assert_eq!(config.detector, DetectorConfig::Face(FaceDetectorOptions::default()));
    }

    #[test]
    fn test_hand_defaults_to_configured_page() {
        let (_, spec) = prepare_args(&["visionloop", "hand"]);
        assert_eq!(spec, SourceSpec::Page(DEFAULT_HAND_PAGE_URL.to_string()));
    }

    #[test]
    fn test_face_flags_override_options() {
        let (config, spec) = prepare_args(&[
            "visionloop",
            "face",
            "--device",
            "1",
            "--confidence",
            "0.7",
            "--model",
            "short-range",
            "--no-mirror",
        ]);
        assert_eq!(spec, SourceSpec::Device(1));
        assert!(!config.mirror);
        assert_eq!(
            config.detector,
            DetectorConfig::Face(FaceDetectorOptions {
                model_selection: FaceModel::ShortRange,
                min_detection_confidence: 0.7,
            })
        );
    }

    #[test]
    fn test_hand_flags_override_options() {
        let (config, spec) = prepare_args(&[
            "visionloop",
            "hand",
            "--stream",
            "https://cdn.example.com/v.mp4",
            "--max-hands",
            "1",
            "--tracking-confidence",
            "0.8",
            "--model-dir",
            "/opt/models",
        ]);
        assert_eq!(spec, SourceSpec::Stream("https://cdn.example.com/v.mp4".into()));
        assert_eq!(config.models.model_dir, Some(PathBuf::from("/opt/models")));
        assert_eq!(
            config.detector,
            DetectorConfig::Hand(HandLandmarkerOptions {
                max_num_hands: 1,
                min_tracking_confidence: 0.8,
                ..HandLandmarkerOptions::default()
            })
        );
    }

    #[test]
    fn test_hand_page_flag() {
        let (_, spec) = prepare_args(&["visionloop", "hand", "--page", "https://example.com/v"]);
        assert_eq!(spec, SourceSpec::Page("https://example.com/v".into()));
    }

    #[test]
    fn test_sources_are_mutually_exclusive() {
        let both_file_and_device = ["visionloop", "face", "--file", "a.mp4", "--device", "0"];
        assert!(Cli::try_parse_from(both_file_and_device).is_err());
        let both_page_and_device = ["visionloop", "hand", "--page", "https://x", "--device", "0"];
        assert!(Cli::try_parse_from(both_page_and_device).is_err());
    }

    #[test]
    fn test_face_page_flag_not_accepted() {
        assert!(Cli::try_parse_from(["visionloop", "face", "--page", "https://x"]).is_err());
    }

    #[test]
    fn test_config_file_detector_kind_follows_subcommand() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "key_poll_ms": 10, "detector": { "kind": "hand", "max_num_hands": 3 } }"#,
        )
        .unwrap();
        let path = path.to_str().unwrap();

        let (config, _) = prepare_args(&["visionloop", "face", "--config", path]);
        assert_eq!(config.key_poll_ms, 10);
        assert_eq!(config.detector, DetectorConfig::Face(FaceDetectorOptions::default()));

        let (config, _) = prepare_args(&["visionloop", "hand", "--config", path]);
        match config.detector {
            DetectorConfig::Hand(opts) => assert_eq!(opts.max_num_hands, 3),
            DetectorConfig::Face(_) => panic!("expected hand options"),
        }
    }

    #[test]
    fn test_missing_config_file_is_error() {
        let cli =
            Cli::try_parse_from(["visionloop", "face", "--config", "/nonexistent/c.json"]).unwrap();
        assert!(prepare(cli.command).is_err());
    }

    #[test]
    fn test_describe_report() {
        let report = RunReport {
            final_state: LoopState::Cancelled,
            frames_processed: 12,
        };
        assert_eq!(describe(&report), "Stopped by user after 12 frames");
    }

    #[test]
    fn test_describe_terminal_states() {
        let report = |final_state| RunReport {
            final_state,
            frames_processed: 3,
        };
        assert_eq!(
            describe(&report(LoopState::Exhausted)),
            "Source ended after 3 frames"
        );
        assert_eq!(
            describe(&report(LoopState::Failed {
                reason: "read failed: broken pipe".to_string()
            })),
            "Stopped after 3 frames: read failed: broken pipe"
        );
    }
}
