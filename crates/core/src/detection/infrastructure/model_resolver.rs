use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::config::ModelConfig;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
    #[error("model {name} not found in {searched:?} and no download URL is configured")]
    NotFound { name: String, searched: Vec<PathBuf> },
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Resolve a model file by name, checking local locations before downloading.
///
/// Resolution order:
/// 1. User cache directory (platform-specific)
/// 2. Configured model directory
/// 3. Download from `<download_base_url>/<name>` into the cache
pub fn resolve(
    name: &str,
    models: &ModelConfig,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let cache_dir = model_cache_dir()?;
    resolve_in(
        name,
        &cache_dir,
        models.model_dir.as_deref(),
        models.download_base_url.as_deref(),
        progress,
    )
}

fn resolve_in(
    name: &str,
    cache_dir: &Path,
    model_dir: Option<&Path>,
    base_url: Option<&str>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let cached_path = cache_dir.join(name);
    if cached_path.exists() {
        log::debug!("Model {} found in cache", name);
        return Ok(cached_path);
    }

    if let Some(dir) = model_dir {
        let local_path = dir.join(name);
        if local_path.exists() {
            log::debug!("Model {} found in {}", name, dir.display());
            return Ok(local_path);
        }
    }

    let Some(base) = base_url else {
        let mut searched = vec![cache_dir.to_path_buf()];
        searched.extend(model_dir.map(Path::to_path_buf));
        return Err(ModelResolveError::NotFound {
            name: name.to_string(),
            searched,
        });
    };

    let url = format!("{}/{}", base.trim_end_matches('/'), name);
    log::info!("Downloading model {} from {}", name, url);
    fs::create_dir_all(cache_dir).map_err(ModelResolveError::CacheDir)?;
    download(&url, &cached_path, progress)?;
    Ok(cached_path)
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/VisionLoop/models/`
/// - Linux: `$XDG_CACHE_HOME/VisionLoop/models/` or `~/.cache/VisionLoop/models/`
/// - Windows: `%LOCALAPPDATA%/VisionLoop/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .map(|d| d.join("VisionLoop").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir()
            .map(|d| d.join("VisionLoop").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
}

fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let temp_path = dest.with_extension("part");

    let result = download_inner(url, dest, &temp_path, progress);

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }

    result
}

fn download_inner(
    url: &str,
    dest: &Path,
    temp_path: &Path,
    progress: Option<ProgressFn>,
) -> Result<(), ModelResolveError> {
    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| ModelResolveError::Download {
            url: url.to_string(),
            source: e,
        })?;

    let total = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;

    let write_err = |e| ModelResolveError::Write {
        path: temp_path.to_path_buf(),
        source: e,
    };
    let mut file = fs::File::create(temp_path).map_err(write_err)?;

    let mut buf = vec![0u8; 256 * 1024];
    loop {
        let n = response.read(&mut buf).map_err(write_err)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(write_err)?;
        downloaded += n as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }

    file.flush().map_err(write_err)?;
    drop(file);

    fs::rename(temp_path, dest).map_err(|e| ModelResolveError::Write {
        path: dest.to_path_buf(),
        source: e,
    })?;

    Ok(())
}
