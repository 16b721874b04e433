//! Locating the downloaded file in the destination directory
//!
//! The tool writes into staging names (`.part`, fragment files, unmerged
//! streams) and renames to the final `<title>_<hash>.<ext>` only once merging
//! finishes, so the final path is discovered by scanning for the hash.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;

use crate::content_hash;
use crate::error::{AcquireError, Result};

/// Extensions the tool uses for files that are still being written or merged
pub const TEMPORARY_EXTENSIONS: &[&str] = &[
    ".part", ".temp", ".webm", ".ts", ".m4a", ".m4v", ".frag", ".ytdl", ".f248",
];

/// How long to tolerate an empty directory before concluding the tool produced nothing
const NOTHING_STAGED_GRACE: Duration = Duration::from_secs(10);

/// Whether a file name is a staging artefact rather than a finished file
pub fn is_temporary_file(name: &str) -> bool {
    TEMPORARY_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

/// Files in `dir` carrying `hash`, split into final and staging
#[derive(Debug, Default)]
pub struct HashScan {
    /// `<title>_<hash>.<extension>`, if present
    pub final_file: Option<PathBuf>,
    /// Staging files mentioning the hash
    pub staged: Vec<PathBuf>,
}

/// Scan `dir` for files belonging to `hash`
pub async fn scan_for_hash(dir: &Path, hash: &str, extension: &str) -> std::io::Result<HashScan> {
    let mut scan = HashScan::default();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !name.contains(hash) {
            continue;
        }
        // exact final name wins even when the primary extension doubles as a staging one
        if content_hash::matches_file_name(name, hash, extension) {
            scan.final_file = Some(entry.path());
        } else if is_temporary_file(name) {
            scan.staged.push(entry.path());
        }
    }

    Ok(scan)
}

/// Wait until the final file for `hash` exists and is non-empty
///
/// Polls every `poll` until `timeout`. Fails early with
/// [`AcquireError::OutputNotFound`] if neither a staging nor a final file has
/// appeared after a short grace period.
pub async fn wait_for_final_file(
    dir: &Path,
    hash: &str,
    extension: &str,
    timeout: Duration,
    poll: Duration,
) -> Result<PathBuf> {
    let started = Instant::now();
    let grace = NOTHING_STAGED_GRACE.min(timeout);

    loop {
        let mut nothing_staged = false;
        match scan_for_hash(dir, hash, extension).await {
            Ok(scan) => {
                if let Some(path) = scan.final_file.as_ref() {
                    match tokio::fs::metadata(path).await {
                        Ok(meta) if meta.len() > 0 => return Ok(path.clone()),
                        _ => tracing::debug!(path = %path.display(), "final file not yet written"),
                    }
                } else if scan.staged.is_empty() {
                    nothing_staged = true;
                } else {
                    tracing::debug!(
                        hash,
                        staged = scan.staged.len(),
                        "waiting for staged file to be renamed"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "failed to scan output directory");
            }
        }

        let elapsed = started.elapsed();
        if nothing_staged && elapsed >= grace {
            return Err(AcquireError::OutputNotFound {
                hash: hash.to_string(),
            }
            .into());
        }
        if elapsed >= timeout {
            return Err(AcquireError::FinalizeTimeout {
                hash: hash.to_string(),
                waited: timeout,
            }
            .into());
        }

        tokio::time::sleep(poll).await;
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    const HASH: &str = "0123456789abcdef";

    #[test]
    fn temporary_extensions_are_recognised() {
        assert!(is_temporary_file("Clip_0123456789abcdef.mp4.part"));
        assert!(is_temporary_file("Clip_0123456789abcdef.f248.webm"));
        assert!(is_temporary_file("Clip_0123456789abcdef.m4a"));
        assert!(is_temporary_file("Clip_0123456789abcdef.mp4.ytdl"));
        assert!(!is_temporary_file("Clip_0123456789abcdef.mp4"));
    }

    #[tokio::test]
    async fn scan_separates_final_from_staged() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join(format!("Clip_{HASH}.mp4")), b"data")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join(format!("Clip_{HASH}.m4a")), b"audio")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("Other_ffffffffffffffff.mp4"), b"x")
            .await
            .unwrap();

        let scan = scan_for_hash(dir.path(), HASH, "mp4").await.unwrap();
        assert_eq!(
            scan.final_file,
            Some(dir.path().join(format!("Clip_{HASH}.mp4")))
        );
        assert_eq!(scan.staged.len(), 1);
    }

    #[tokio::test]
    async fn webm_primary_extension_is_a_final_file() {
        let dir = tempfile::tempdir().unwrap();
        let final_path = dir.path().join(format!("Clip_{HASH}.webm"));
        tokio::fs::write(&final_path, b"data").await.unwrap();
        tokio::fs::write(dir.path().join(format!("Clip_{HASH}.f248.webm")), b"video")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join(format!("Clip_{HASH}.webm.part")), b"partial")
            .await
            .unwrap();

        let scan = scan_for_hash(dir.path(), HASH, "webm").await.unwrap();
        assert_eq!(scan.final_file, Some(final_path.clone()));
        assert_eq!(scan.staged.len(), 2);

        let found = wait_for_final_file(
            dir.path(),
            HASH,
            "webm",
            Duration::from_secs(5),
            Duration::from_millis(10),
        )
        .await
        .unwrap();
        assert_eq!(found, final_path);
    }

    #[tokio::test]
    async fn existing_final_file_returns_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("Clip_{HASH}.mp4"));
        tokio::fs::write(&path, b"data").await.unwrap();

        let found = wait_for_final_file(
            dir.path(),
            HASH,
            "mp4",
            Duration::from_secs(5),
            Duration::from_millis(10),
        )
        .await
        .unwrap();
        assert_eq!(found, path);
    }

    #[tokio::test]
    async fn staged_file_is_awaited_until_renamed() {
        let dir = tempfile::tempdir().unwrap();
        let staged = dir.path().join(format!("Clip_{HASH}.mp4.part"));
        let final_path = dir.path().join(format!("Clip_{HASH}.mp4"));
        tokio::fs::write(&staged, b"partial").await.unwrap();

        let (s, f) = (staged.clone(), final_path.clone());
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            tokio::fs::rename(&s, &f).await.unwrap();
        });

        let found = wait_for_final_file(
            dir.path(),
            HASH,
            "mp4",
            Duration::from_secs(5),
            Duration::from_millis(20),
        )
        .await
        .unwrap();
        assert_eq!(found, final_path);
    }

    #[tokio::test]
    async fn staged_file_that_never_finishes_times_out() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join(format!("Clip_{HASH}.mp4.part")), b"partial")
            .await
            .unwrap();

        let err = wait_for_final_file(
            dir.path(),
            HASH,
            "mp4",
            Duration::from_millis(100),
            Duration::from_millis(20),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Acquire(AcquireError::FinalizeTimeout { .. })
        ));
    }

    #[tokio::test]
    async fn nothing_staged_is_output_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = wait_for_final_file(
            dir.path(),
            HASH,
            "mp4",
            Duration::from_millis(50),
            Duration::from_millis(10),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Acquire(AcquireError::OutputNotFound { .. })
        ));
    }
}
