//! Fetcher used when no download tool is installed

use async_trait::async_trait;

use super::traits::MediaFetcher;
use crate::error::AcquireError;
use crate::types::MediaMetadata;

/// Fetcher that fails every call with [`AcquireError::ToolMissing`]
///
/// Lets the downloader start without the tool so that tasks fail with
/// installation instructions instead of the whole service refusing to boot.
///
/// # Examples
///
/// ```
/// use media_dl::executor::{MediaFetcher, NoOpFetcher};
///
/// # #[tokio::main]
/// # async fn main() {
/// let fetcher = NoOpFetcher::new("yt-dlp");
/// let err = fetcher.ensure_available().await.unwrap_err();
/// assert!(err.to_string().contains("yt-dlp is not installed"));
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct NoOpFetcher {
    tool: String,
}

impl NoOpFetcher {
    /// Create a fetcher reporting `tool` as missing
    pub fn new(tool: impl Into<String>) -> Self {
        Self { tool: tool.into() }
    }

    fn missing(&self) -> crate::Error {
        AcquireError::ToolMissing {
            tool: self.tool.clone(),
        }
        .into()
    }
}

#[async_trait]
impl MediaFetcher for NoOpFetcher {
    async fn ensure_available(&self) -> crate::Result<()> {
        Err(self.missing())
    }

    async fn download(
        &self,
        _url: &str,
        _output_template: &str,
        _container: &str,
    ) -> crate::Result<MediaMetadata> {
        Err(self.missing())
    }

    async fn fetch_metadata(&self, _url: &str) -> crate::Result<MediaMetadata> {
        Err(self.missing())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}
