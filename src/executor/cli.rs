//! Fetcher that runs an external yt-dlp compatible binary

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::metadata::ToolInfo;
use super::traits::MediaFetcher;
use crate::error::{AcquireError, Error};
use crate::types::MediaMetadata;

/// CLI-based fetcher using an external yt-dlp compatible binary
///
/// Child processes are spawned with `kill_on_drop`, so dropping a pending
/// `download` future (cancellation, deadline, shutdown) terminates the tool.
///
/// # Examples
///
/// ```no_run
/// use media_dl::executor::CliFetcher;
/// use std::path::PathBuf;
///
/// // Create with explicit path
/// let fetcher = CliFetcher::new(PathBuf::from("/usr/local/bin/yt-dlp"));
///
/// // Or auto-discover from PATH
/// let fetcher = CliFetcher::from_path("yt-dlp").expect("yt-dlp not found in PATH");
/// ```
#[derive(Debug, Clone)]
pub struct CliFetcher {
    binary_path: PathBuf,
}

impl CliFetcher {
    /// Create a new CLI fetcher with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find `name` in PATH
    ///
    /// Returns `None` if the binary is not found.
    pub fn from_path(name: &str) -> Option<Self> {
        which::which(name).ok().map(Self::new)
    }

    /// Path of the binary this fetcher runs
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    fn tool_name(&self) -> String {
        self.binary_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.binary_path.display().to_string())
    }

    async fn run(&self, args: &[&str]) -> crate::Result<std::process::Output> {
        tracing::debug!(tool = %self.binary_path.display(), ?args, "running download tool");

        let output = Command::new(&self.binary_path)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| -> Error {
                if e.kind() == std::io::ErrorKind::NotFound {
                    AcquireError::ToolMissing {
                        tool: self.tool_name(),
                    }
                    .into()
                } else {
                    AcquireError::Spawn(format!(
                        "Failed to execute {}: {}",
                        self.binary_path.display(),
                        e
                    ))
                    .into()
                }
            })?;

        if !output.status.success() {
            return Err(AcquireError::ToolFailed {
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }

        Ok(output)
    }
}

#[async_trait]
impl MediaFetcher for CliFetcher {
    async fn ensure_available(&self) -> crate::Result<()> {
        match tokio::fs::metadata(&self.binary_path).await {
            Ok(meta) if meta.is_file() => Ok(()),
            _ => Err(AcquireError::ToolMissing {
                tool: self.tool_name(),
            }
            .into()),
        }
    }

    async fn download(
        &self,
        url: &str,
        output_template: &str,
        container: &str,
    ) -> crate::Result<MediaMetadata> {
        let output = self
            .run(&[
                "--dump-json",
                "--no-simulate",
                "-o",
                output_template,
                "--merge-output-format",
                container,
                "--windows-filenames",
                "--no-playlist",
                "--quiet",
                url,
            ])
            .await?;

        match ToolInfo::from_stdout(&output.stdout) {
            Some(info) => Ok(info.into_metadata()),
            None => {
                tracing::warn!(url, "download tool printed no usable metadata");
                Ok(MediaMetadata::default())
            }
        }
    }

    async fn fetch_metadata(&self, url: &str) -> crate::Result<MediaMetadata> {
        let output = self
            .run(&["--dump-json", "--no-playlist", "--skip-download", url])
            .await?;

        ToolInfo::from_stdout(&output.stdout)
            .map(ToolInfo::into_metadata)
            .ok_or_else(|| Error::Other(format!("no metadata returned for {}", url)))
    }

    fn name(&self) -> &'static str {
        "cli"
    }
}
