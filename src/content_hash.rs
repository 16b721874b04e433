//! Content addressing for source URLs
//!
//! A URL maps to a short, fixed-width hex digest. The digest doubles as the
//! cache key and as the suffix of the downloaded file's name
//! (`<title>_<hash>.<ext>`), so a directory scan alone can recover which file
//! belongs to which URL.

use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::path::Path;

/// Number of digest bytes kept (hex-encoded to twice as many characters)
pub const HASH_BYTES: usize = 8;

/// Length of a content hash in characters
pub const HASH_LEN: usize = HASH_BYTES * 2;

/// Compute the content hash of a source URL
///
/// SHA-256 of the URL bytes, truncated to the first [`HASH_BYTES`] bytes and
/// lowercase hex-encoded. Deterministic and side-effect free.
pub fn hash_url(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    let digest = hasher.finalize();

    let mut out = String::with_capacity(HASH_LEN);
    for byte in &digest[..HASH_BYTES] {
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

/// File name suffix for a hash and extension: `_<hash>.<ext>`
pub fn file_suffix(hash: &str, extension: &str) -> String {
    format!("_{}.{}", hash, extension)
}

/// Whether a file name belongs to the given hash with the given extension
pub fn matches_file_name(name: &str, hash: &str, extension: &str) -> bool {
    name.ends_with(&file_suffix(hash, extension))
}

/// Extract the content hash embedded in a media file name, if any
///
/// Recognises the final `<title>_<hash>.<ext>` as well as the tool's
/// intermediate names that append format tags or staging suffixes after the
/// hash (`<title>_<hash>.f137.mp4`, `<title>_<hash>.mp4.part`). The last
/// `_<hash>` followed by a `.` wins, so titles containing underscores or
/// dots are fine. Returns `None` for names that carry no hash.
pub fn hash_from_path(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let bytes = name.as_bytes();

    name.match_indices('_').rev().find_map(|(at, _)| {
        let start = at + 1;
        let end = start + HASH_LEN;
        let candidate = name.get(start..end)?;
        let terminated = bytes.get(end).is_some_and(|&b| b == b'.');
        if terminated && candidate.bytes().all(|b| b.is_ascii_hexdigit()) {
            Some(candidate.to_ascii_lowercase())
        } else {
            None
        }
    })
}
