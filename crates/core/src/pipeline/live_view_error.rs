use thiserror::Error;

/// Reasons a live-view run never reached its frame loop.
///
/// Failures inside the loop are not errors; they end the run with
/// [`LoopState::Failed`](super::live_view_use_case::LoopState::Failed).
#[derive(Error, Debug)]
pub enum LiveViewError {
    #[error("could not resolve a stream for {page_url}: {reason}")]
    Resolution { page_url: String, reason: String },
    #[error("could not open {locator}: {reason}")]
    Open { locator: String, reason: String },
}
