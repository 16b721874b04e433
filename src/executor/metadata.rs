//! Parsing of the JSON document the download tool prints with `--dump-json`
//!
//! Only the handful of fields we use are modelled; everything else in the
//! (large, tool-version-dependent) document is ignored. Every field is optional
//! so a partial document still yields partial metadata.

use serde::Deserialize;

use crate::types::MediaMetadata;

/// Subset of the tool's info document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolInfo {
    /// Source title
    #[serde(default)]
    pub title: Option<String>,

    /// Available thumbnails, ordered worst to best by the tool
    #[serde(default)]
    pub thumbnails: Option<Vec<Thumbnail>>,

    /// Single thumbnail URL some extractors provide instead of a list
    #[serde(default)]
    pub thumbnail: Option<String>,

    /// Duration in seconds (may be fractional)
    #[serde(default)]
    pub duration: Option<f64>,
}

/// One entry of the `thumbnails` list
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Thumbnail {
    #[serde(default)]
    pub url: Option<String>,
    /// Free-form label such as "medium" or "1280x720"
    #[serde(default)]
    pub resolution: Option<String>,
}

impl ToolInfo {
    /// Parse the tool's standard output
    ///
    /// The tool prints one JSON document per line; the last line holding a
    /// JSON object wins. Returns `None` when no line parses.
    pub fn from_stdout(stdout: &[u8]) -> Option<Self> {
        let text = String::from_utf8_lossy(stdout);
        text.lines()
            .rev()
            .map(str::trim)
            .filter(|line| line.starts_with('{'))
            .find_map(|line| serde_json::from_str(line).ok())
    }

    /// Best thumbnail URL: a "medium" entry if present, else the last entry
    pub fn best_thumbnail(&self) -> Option<String> {
        let thumbnails = self.thumbnails.as_deref().unwrap_or_default();
        thumbnails
            .iter()
            .find(|t| t.resolution.as_deref() == Some("medium"))
            .or_else(|| thumbnails.last())
            .and_then(|t| t.url.clone())
            .or_else(|| self.thumbnail.clone())
    }

    /// Duration formatted as `minutes:seconds`
    pub fn formatted_duration(&self) -> Option<String> {
        self.duration
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map(|d| format_duration(d as u64))
    }

    /// Reduce to the metadata we persist
    pub fn into_metadata(self) -> MediaMetadata {
        MediaMetadata {
            thumbnail_url: self.best_thumbnail(),
            duration: self.formatted_duration(),
            title: self.title.filter(|t| !t.is_empty()),
        }
    }
}

/// Format whole seconds as `m:ss` (minutes are not wrapped into hours)
pub fn format_duration(total_secs: u64) -> String {
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}
