use std::time::{Duration, Instant};

use crate::detection::domain::detector::Detector;
use crate::display::domain::frame_display::{DisplayInput, FrameDisplay};
use crate::overlay::domain::overlay_renderer::OverlayRenderer;
use crate::shared::frame::PixelLayout;
use crate::shared::source::{SourceLocator, SourceSpec};
use crate::video::domain::frame_source::FrameSource;
use crate::video::domain::stream_resolver::StreamResolver;

use super::live_view_error::LiveViewError;
use super::pipeline_logger::PipelineLogger;

/// State of the frame loop. Everything but `Running` is terminal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoopState {
    Running,
    /// The user pressed Escape or closed the window.
    Cancelled,
    /// The source reported end of stream.
    Exhausted,
    /// A read, detect, render or display step failed.
    Failed { reason: String },
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LoopState::Running)
    }
}

/// Outcome of a run that reached the frame loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunReport {
    pub final_state: LoopState,
    /// Frames that made it all the way to the display.
    pub frames_processed: usize,
}

/// Plays one source through detect, overlay and display until the user
/// cancels or the source ends.
///
/// Owns every component for the duration of the run and releases them in
/// a fixed order (display, source, detector) however the run ends.
/// Single-use: `execute` consumes the use case.
pub struct LiveViewUseCase {
    resolver: Option<Box<dyn StreamResolver>>,
    source: Box<dyn FrameSource>,
    detector: Box<dyn Detector>,
    renderer: Box<dyn OverlayRenderer>,
    display: Box<dyn FrameDisplay>,
    logger: Box<dyn PipelineLogger>,
    mirror: bool,
    key_poll: Duration,
}

impl LiveViewUseCase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        resolver: Option<Box<dyn StreamResolver>>,
        source: Box<dyn FrameSource>,
        detector: Box<dyn Detector>,
        renderer: Box<dyn OverlayRenderer>,
        display: Box<dyn FrameDisplay>,
        logger: Box<dyn PipelineLogger>,
        mirror: bool,
        key_poll: Duration,
    ) -> Self {
        Self {
            resolver,
            source,
            detector,
            renderer,
            display,
            logger,
            mirror,
            key_poll,
        }
    }

    pub fn execute(mut self, spec: &SourceSpec) -> Result<RunReport, LiveViewError> {
        let result = self.start(spec).map(|_| self.run_loop());
        self.release();
        if let Ok(report) = &result {
            self.logger.progress(report.frames_processed);
            self.logger.summary();
        }
        result
    }

    fn start(&mut self, spec: &SourceSpec) -> Result<(), LiveViewError> {
        let locator = self.resolve(spec)?;
        let info = self
            .source
            .open(&locator)
            .map_err(|e| LiveViewError::Open {
                locator: locator.to_string(),
                reason: e.to_string(),
            })?;
        self.logger.info(&format!(
            "Playing {locator} ({}x{}); press Escape to quit",
            info.width, info.height
        ));
        Ok(())
    }

    fn resolve(&self, spec: &SourceSpec) -> Result<SourceLocator, LiveViewError> {
        match spec {
            SourceSpec::File(path) => Ok(SourceLocator::File(path.clone())),
            SourceSpec::Device(index) => Ok(SourceLocator::Device(*index)),
            SourceSpec::Stream(url) => Ok(SourceLocator::Stream(url.clone())),
            SourceSpec::Page(page_url) => {
                let resolution = |reason: String| LiveViewError::Resolution {
                    page_url: page_url.clone(),
                    reason,
                };
                let resolver = self
                    .resolver
                    .as_ref()
                    .ok_or_else(|| resolution("no stream resolver configured".into()))?;
                let url = resolver
                    .resolve(page_url)
                    .map_err(|e| resolution(e.to_string()))?;
                log::info!("Resolved stream URL for {page_url}");
                Ok(SourceLocator::Stream(url))
            }
        }
    }

    fn run_loop(&mut self) -> RunReport {
        let mut frames_processed = 0;
        let mut state = LoopState::Running;
        while !state.is_terminal() {
            state = self.step(&mut frames_processed);
        }
        match &state {
            LoopState::Failed { reason } => {
                log::warn!("Stopped after {frames_processed} frames: {reason}")
            }
            LoopState::Exhausted => log::info!("End of stream after {frames_processed} frames"),
            _ => log::info!("Cancelled after {frames_processed} frames"),
        }
        RunReport {
            final_state: state,
            frames_processed,
        }
    }

    /// One read-detect-render-show-poll iteration.
    fn step(&mut self, frames_processed: &mut usize) -> LoopState {
        let t0 = Instant::now();
        let mut frame = match self.source.read() {
            Ok(Some(frame)) => frame,
            Ok(None) => return LoopState::Exhausted,
            Err(e) => return failed("read", e),
        };
        self.logger.timing("read", elapsed_ms(t0));

        let t0 = Instant::now();
        if self.mirror {
            frame.mirror_horizontal();
        }
        let rgb = frame.to_layout(PixelLayout::Rgb);
        self.logger.timing("convert", elapsed_ms(t0));

        let t0 = Instant::now();
        let detections = match self.detector.detect(&rgb) {
            Ok(detections) => detections,
            Err(e) => return failed("detect", e),
        };
        self.logger.timing("detect", elapsed_ms(t0));
        self.logger.metric("detections", detections.len() as f64);

        if !detections.is_empty() {
            let t0 = Instant::now();
            if let Err(e) = self.renderer.render(&mut frame, &detections) {
                return failed("render", e);
            }
            self.logger.timing("render", elapsed_ms(t0));
        }

        let t0 = Instant::now();
        if let Err(e) = self.display.show(&frame) {
            return failed("display", e);
        }
        self.logger.timing("display", elapsed_ms(t0));

        *frames_processed += 1;
        self.logger.progress(*frames_processed);

        match self.display.poll_input(self.key_poll) {
            Some(DisplayInput::Escape) | Some(DisplayInput::WindowClosed) => LoopState::Cancelled,
            Some(DisplayInput::OtherKey) | None => LoopState::Running,
        }
    }

    fn release(&mut self) {
        self.display.close();
        self.source.close();
        self.detector.close();
        self.logger.info("Released display, source and detector");
    }
}

fn failed(stage: &str, error: Box<dyn std::error::Error>) -> LoopState {
    LoopState::Failed {
        reason: format!("{stage} failed: {error}"),
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
