use std::fmt;
use std::path::{Path, PathBuf};

use super::constants::IMAGE_EXTENSIONS;

/// What the user asked to play.
///
/// `Page` is a shareable video page that must go through a stream
/// resolver before anything can be decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceSpec {
    File(PathBuf),
    Device(u32),
    Stream(String),
    Page(String),
}

/// A source a frame source can open directly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceLocator {
    File(PathBuf),
    Device(u32),
    Stream(String),
}

impl SourceLocator {
    /// True for files whose extension marks them as still images.
    pub fn is_image_file(&self) -> bool {
        match self {
            SourceLocator::File(path) => is_image(path),
            _ => false,
        }
    }
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceSpec::File(path) => write!(f, "file {}", path.display()),
            SourceSpec::Device(index) => write!(f, "device #{index}"),
            SourceSpec::Stream(url) => write!(f, "stream {url}"),
            SourceSpec::Page(url) => write!(f, "page {url}"),
        }
    }
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocator::File(path) => write!(f, "file {}", path.display()),
            SourceLocator::Device(index) => write!(f, "device #{index}"),
            // Resolved stream URLs are long and signed; the host is enough.
            SourceLocator::Stream(url) => write!(f, "stream {}", url_host(url)),
        }
    }
}

pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn url_host(url: &str) -> &str {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    without_scheme
        .split(['/', '?'])
        .next()
        .unwrap_or(without_scheme)
}
