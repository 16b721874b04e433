//! Trait for the external download tool

use async_trait::async_trait;

use crate::types::MediaMetadata;

/// Interface to the external media download tool
///
/// Implementations run the actual transfer; everything around it (cache
/// lookup, claims, markers, locating the final file) lives in
/// [`Acquirer`](super::Acquirer). Dropping a returned future must stop the
/// underlying process, which is how cancellation and deadlines reach it.
///
/// # Examples
///
/// ```no_run
/// use media_dl::executor::{CliFetcher, MediaFetcher};
///
/// # #[tokio::main]
/// # async fn main() -> media_dl::Result<()> {
/// let fetcher = CliFetcher::from_path("yt-dlp").expect("yt-dlp not found in PATH");
/// let metadata = fetcher
///     .fetch_metadata("https://example.com/watch?id=abc")
///     .await?;
/// println!("{:?}", metadata.title);
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Fail with [`AcquireError::ToolMissing`](crate::error::AcquireError::ToolMissing)
    /// if the tool cannot be run
    async fn ensure_available(&self) -> crate::Result<()>;

    /// Download `url` to `output_template`, forcing the `container` format
    ///
    /// The template uses the tool's `%(title)s`/`%(ext)s` placeholders. Metadata
    /// is requested in the same invocation; if the tool prints none (or
    /// garbage) the download still succeeds with empty metadata.
    async fn download(
        &self,
        url: &str,
        output_template: &str,
        container: &str,
    ) -> crate::Result<MediaMetadata>;

    /// Fetch metadata only, without downloading media
    async fn fetch_metadata(&self, url: &str) -> crate::Result<MediaMetadata>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
