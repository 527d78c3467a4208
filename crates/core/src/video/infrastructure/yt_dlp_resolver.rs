use std::process::Command;

use thiserror::Error;

use crate::shared::config::ResolverConfig;
use crate::video::domain::stream_resolver::StreamResolver;

#[derive(Error, Debug)]
pub enum StreamResolveError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("{program} returned no stream URL for {page_url}")]
    NoUrl { program: String, page_url: String },
}

/// Resolves video pages by asking `yt-dlp` for the direct media URL.
///
/// One attempt per call; the resolved URL is whatever the first line of
/// the program's output says.
pub struct YtDlpResolver {
    program: String,
    format: String,
}

impl YtDlpResolver {
    pub fn new(config: &ResolverConfig) -> Self {
        Self {
            program: config.program.clone(),
            format: config.format.clone(),
        }
    }

    fn args<'a>(&'a self, page_url: &'a str) -> [&'a str; 7] {
        [
            "--quiet",
            "--no-warnings",
            "--no-playlist",
            "--format",
            &self.format,
            "--get-url",
            page_url,
        ]
    }
}

impl StreamResolver for YtDlpResolver {
    fn resolve(&self, page_url: &str) -> Result<String, Box<dyn std::error::Error>> {
        log::info!("Resolving stream URL with {}", self.program);
        let output = Command::new(&self.program)
            .args(self.args(page_url))
            .output()
            .map_err(|e| StreamResolveError::Spawn {
                program: self.program.clone(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(StreamResolveError::Failed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let url = stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .ok_or_else(|| StreamResolveError::NoUrl {
                program: self.program.clone(),
                page_url: page_url.to_string(),
            })?;
        Ok(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(program: &str) -> YtDlpResolver {
        YtDlpResolver::new(&ResolverConfig {
            program: program.to_string(),
            ..ResolverConfig::default()
        })
    }

    #[test]
    fn test_args_request_single_direct_url() {
        let r = resolver("yt-dlp");
        let args = r.args("https://example.com/watch");
        assert_eq!(args[3], "--format");
        assert_eq!(args[4], "best[ext=mp4]/best");
        assert_eq!(args[5], "--get-url");
        assert_eq!(args[6], "https://example.com/watch");
        assert!(args.contains(&"--no-playlist"));
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let err = resolver("/nonexistent/yt-dlp")
            .resolve("https://example.com/watch")
            .unwrap_err();
        let err = err.downcast::<StreamResolveError>().unwrap();
        assert!(matches!(*err, StreamResolveError::Spawn { .. }));
    }

    #[cfg(unix)]
    mod with_fake_program {
        use super::*;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use std::path::PathBuf;
        use std::sync::{Mutex, MutexGuard};

        /// Writing an executable while another test thread forks can make
        /// exec fail with ETXTBSY; these tests take turns.
        static SPAWN_LOCK: Mutex<()> = Mutex::new(());

        fn serial() -> MutexGuard<'static, ()> {
            SPAWN_LOCK.lock().unwrap_or_else(|e| e.into_inner())
        }

        fn fake_program(dir: &tempfile::TempDir, script: &str) -> PathBuf {
            let path = dir.path().join("fake-yt-dlp");
            fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[test]
        fn test_returns_first_output_line() {
            let _guard = serial();
            let dir = tempfile::tempdir().unwrap();
            let program = fake_program(
                &dir,
                "echo 'https://cdn.example.com/v.mp4?sig=1'\necho 'https://cdn.example.com/a.m4a'",
            );
            let url = resolver(program.to_str().unwrap())
                .resolve("https://example.com/watch")
                .unwrap();
            assert_eq!(url, "https://cdn.example.com/v.mp4?sig=1");
        }

        #[test]
        fn test_passes_page_url_last() {
            let _guard = serial();
            let dir = tempfile::tempdir().unwrap();
            let program = fake_program(&dir, "for last; do :; done\necho \"$last\"");
            let url = resolver(program.to_str().unwrap())
                .resolve("https://example.com/page")
                .unwrap();
            assert_eq!(url, "https://example.com/page");
        }

        #[test]
        fn test_non_zero_exit_is_failure() {
            let _guard = serial();
            let dir = tempfile::tempdir().unwrap();
            let program = fake_program(&dir, "echo 'ERROR: video unavailable' >&2\nexit 1");
            let err = resolver(program.to_str().unwrap())
                .resolve("https://example.com/watch")
                .unwrap_err();
            let err = err.downcast::<StreamResolveError>().unwrap();
            match *err {
                StreamResolveError::Failed { stderr, .. } => {
                    assert_eq!(stderr, "ERROR: video unavailable");
                }
                other => panic!("expected Failed, got {other:?}"),
            }
        }

        #[test]
        fn test_empty_output_is_no_url() {
            let _guard = serial();
            let dir = tempfile::tempdir().unwrap();
            let program = fake_program(&dir, "exit 0");
            let err = resolver(program.to_str().unwrap())
                .resolve("https://example.com/watch")
                .unwrap_err();
            let err = err.downcast::<StreamResolveError>().unwrap();
            assert!(matches!(*err, StreamResolveError::NoUrl { .. }));
        }
    }
}
