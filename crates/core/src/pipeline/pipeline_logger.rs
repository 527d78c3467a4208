use std::collections::HashMap;
use std::time::Instant;

/// Cross-cutting logger for pipeline orchestration events.
///
/// Decouples the live-view loop from specific output mechanisms so callers
/// can observe it without changing the orchestration code.
pub trait PipelineLogger: Send {
    /// Report that `frames` frames have been fully processed so far.
    /// Live sources have no known total.
    fn progress(&mut self, frames: usize);

    /// Record how long a named pipeline stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. detections per frame).
    fn metric(&mut self, name: &str, value: f64);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Silent logger that discards all events.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _frames: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Running count and sum of one series of samples.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Tally {
    pub count: usize,
    pub total: f64,
}

impl Tally {
    fn add(&mut self, value: f64) {
        self.count += 1;
        self.total += value;
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// Console logger that tracks per-stage timing and metrics and prints a
/// summary when the run ends.
///
/// Samples are folded into a [`Tally`] per name, so memory stays flat on
/// live sources that never end. Progress output is throttled to every
/// `throttle_frames` frames.
pub struct StdoutPipelineLogger {
    throttle_frames: usize,
    timings: HashMap<String, Tally>,
    metrics: HashMap<String, Tally>,
    start_time: Instant,
    frames: usize,
    messages: Vec<String>,
}

impl StdoutPipelineLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            frames: 0,
            messages: Vec::new(),
        }
    }

    /// Returns the formatted summary string, or `None` if no data recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let frames = self.frames;
        let mut lines = Vec::new();

        lines.push(format!(
            "Run summary ({frames} frames, {:.1}s total):",
            elapsed_ms / 1000.0
        ));

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let tally = self.timings[stage];
            let (total_ms, avg_ms) = (tally.total, tally.mean());
            let pct = if elapsed_ms > 0.0 {
                total_ms / elapsed_ms * 100.0
            } else {
                0.0
            };
            lines.push(format!(
                "  {stage:12}: avg {avg_ms:6.1}ms  total {total_ms:7.0}ms  ({pct:4.1}%)"
            ));
        }

        let mut metric_names: Vec<_> = self.metrics.keys().collect();
        metric_names.sort();
        for name in metric_names {
            let avg = self.metrics[name].mean();
            lines.push(format!("  {name}: avg {avg:.1}"));
        }

        if frames > 0 && elapsed_ms > 0.0 {
            let fps = frames as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Throughput: {fps:.1} fps"));
        }

        Some(lines.join("\n"))
    }

    /// Returns the accumulated timings for a given stage.
    pub fn timings_for(&self, stage: &str) -> Option<Tally> {
        self.timings.get(stage).copied()
    }

    /// Returns the accumulated values for a given metric.
    pub fn metrics_for(&self, name: &str) -> Option<Tally> {
        self.metrics.get(name).copied()
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(100)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, frames: usize) {
        self.frames = frames;
        if frames > 0 && frames % self.throttle_frames == 0 {
            let secs = self.start_time.elapsed().as_secs_f64();
            let fps = if secs > 0.0 { frames as f64 / secs } else { 0.0 };
            log::info!("Processed {frames} frames ({fps:.1} fps)");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .add(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics
            .entry(name.to_string())
            .or_default()
            .add(value);
    }

    fn info(&mut self, message: &str) {
        self.messages.push(message.to_string());
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
