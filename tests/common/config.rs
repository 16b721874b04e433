//! Test configuration helpers for creating test downloaders

use media_dl::{Config, MediaDownloader};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// A downloader over a fresh SQLite store in a temp dir
pub struct TestEnv {
    pub downloader: MediaDownloader,
    pub tool_dir: PathBuf,
    pub temp_dir: TempDir,
}

/// Config rooted in `dir` that runs `tool` (or no tool at all)
pub fn test_config(dir: &Path, tool: Option<PathBuf>) -> Config {
    let mut config = Config::default();
    config.download.output_dir = dir.join("downloads");
    config.download.max_concurrent_downloads = 4;
    config.persistence.database_path = dir.join("media-dl.db");
    config.tools.tool_path = tool;
    config.tools.search_path = false;
    config.tools.finalize_timeout = Duration::from_secs(2);
    config.tools.finalize_poll_interval = Duration::from_millis(20);
    config
}

/// Start a downloader whose tool is `script` (None: no tool installed)
pub async fn start_env(script: Option<&str>, configure: impl FnOnce(&mut Config)) -> TestEnv {
    let temp_dir = tempfile::tempdir().unwrap();
    let tool_dir = temp_dir.path().join("bin");
    std::fs::create_dir_all(&tool_dir).unwrap();

    #[cfg(unix)]
    let tool = script.map(|script| crate::common::write_tool(&tool_dir, script));
    #[cfg(not(unix))]
    let tool = script.map(|_| tool_dir.join("yt-dlp"));

    let mut config = test_config(temp_dir.path(), tool);
    configure(&mut config);

    let downloader = MediaDownloader::new(config).await.unwrap();
    downloader.start().await;

    TestEnv {
        downloader,
        tool_dir,
        temp_dir,
    }
}
