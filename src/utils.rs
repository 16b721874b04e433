//! Utility functions for URL validation, file naming and media types

use crate::error::{Error, Result};
use std::path::Path;

/// Validate a source URL before it is enqueued
///
/// Only absolute `http`/`https` URLs with a host are accepted.
///
/// # Examples
///
/// ```
/// use media_dl::utils::validate_url;
///
/// assert!(validate_url("https://example.com/watch?id=abc").is_ok());
/// assert!(validate_url("ftp://example.com/file").is_err());
/// assert!(validate_url("").is_err());
/// ```
pub fn validate_url(raw: &str) -> Result<url::Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidUrl("URL cannot be empty".to_string()));
    }

    let parsed = url::Url::parse(trimmed)
        .map_err(|e| Error::InvalidUrl(format!("invalid URL format: {}", e)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(Error::InvalidUrl(format!(
                "unsupported scheme '{}': only http and https are allowed",
                other
            )));
        }
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(Error::InvalidUrl("URL has no host".to_string()));
    }

    Ok(parsed)
}

/// Client-facing file name for a stored media file
///
/// Stored names look like `<title>_<hash>.<ext>`; the hash is dropped so the
/// client sees `<title>.<ext>`. With `escape`, double quotes are escaped and
/// line breaks removed so the result can go inside a quoted
/// `Content-Disposition` parameter.
///
/// # Examples
///
/// ```
/// use media_dl::utils::download_filename;
/// use std::path::Path;
///
/// let path = Path::new("/downloads/My Clip_0011223344556677.mp4");
/// assert_eq!(download_filename(path, false), "My Clip.mp4");
/// ```
pub fn download_filename(path: &Path, escape: bool) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("mp4");

    let mut title = match file_name.rfind('_') {
        Some(idx) => file_name[..idx].to_string(),
        None => file_name,
    };
    if title.is_empty() {
        title = "download".to_string();
    }

    let suffix = format!(".{}", extension);
    if !title.ends_with(&suffix) {
        title.push_str(&suffix);
    }

    if escape {
        title = escape_quoted(&title);
    }

    title
}

/// `Content-Disposition` value offering the stored file as an attachment
///
/// ASCII titles go in a plain quoted `filename`. Other titles get an ASCII
/// fallback (non-ASCII characters replaced by `_`) plus an RFC 5987
/// `filename*` carrying the UTF-8 name percent-encoded.
///
/// # Examples
///
/// ```
/// use media_dl::utils::content_disposition;
/// use std::path::Path;
///
/// let path = Path::new("/downloads/Café_0011223344556677.mp4");
/// assert_eq!(
///     content_disposition(path),
///     "attachment; filename=\"Caf_.mp4\"; filename*=UTF-8''Caf%C3%A9.mp4"
/// );
/// ```
pub fn content_disposition(path: &Path) -> String {
    let name = download_filename(path, false);
    if name.is_ascii() {
        return format!("attachment; filename=\"{}\"", escape_quoted(&name));
    }

    let fallback: String = name
        .chars()
        .map(|c| if c.is_ascii() { c } else { '_' })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        escape_quoted(&fallback),
        urlencoding::encode(&name)
    )
}

fn escape_quoted(value: &str) -> String {
    value.replace(['\r', '\n'], "").replace('"', "\\\"")
}

/// Whether `path` has one of `extensions` (case-insensitive, without dots)
pub fn is_media_file(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|m| m.eq_ignore_ascii_case(ext)))
}

/// MIME type for a media file, by extension
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("mp3") => "audio/mpeg",
        Some("m4a") => "audio/mp4",
        _ => "application/octet-stream",
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_url_accepts_http_and_https() {
        assert!(validate_url("https://example.com/watch?id=abc").is_ok());
        assert!(validate_url("http://example.com").is_ok());
        assert!(validate_url("  https://example.com/v  ").is_ok());
    }

    #[test]
    fn validate_url_rejects_other_inputs() {
        for bad in [
            "",
            "   ",
            "not a url",
            "ftp://example.com/file",
            "file:///etc/passwd",
            "javascript:alert(1)",
            "/relative/path",
        ] {
            assert!(
                matches!(validate_url(bad), Err(Error::InvalidUrl(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn download_filename_strips_hash() {
        let path = Path::new("/d/Never Gonna Give You Up_0011223344556677.mp4");
        assert_eq!(download_filename(path, false), "Never Gonna Give You Up.mp4");
    }

    #[test]
    fn download_filename_keeps_underscores_in_title() {
        let path = Path::new("/d/snake_case_title_0011223344556677.webm");
        assert_eq!(download_filename(path, false), "snake_case_title.webm");
    }

    #[test]
    fn download_filename_escapes_quotes() {
        let path = Path::new("/d/The \"Best\" Clip_0011223344556677.mp4");
        assert_eq!(download_filename(path, true), "The \\\"Best\\\" Clip.mp4");
        assert_eq!(download_filename(path, false), "The \"Best\" Clip.mp4");
    }

    #[test]
    fn content_disposition_plain_for_ascii_titles() {
        let path = Path::new("/d/The \"Best\" Clip_0011223344556677.mp4");
        assert_eq!(
            content_disposition(path),
            "attachment; filename=\"The \\\"Best\\\" Clip.mp4\""
        );
    }

    #[test]
    fn content_disposition_encodes_non_ascii_titles() {
        let path = Path::new("/d/日本語 クリップ_0011223344556677.webm");
        let value = content_disposition(path);
        assert_eq!(
            value,
            "attachment; filename=\"___ ____.webm\"; \
             filename*=UTF-8''%E6%97%A5%E6%9C%AC%E8%AA%9E%20%E3%82%AF%E3%83%AA%E3%83%83%E3%83%97.webm"
        );
        assert!(axum::http::HeaderValue::from_str(&value).is_ok());
    }

    #[test]
    fn download_filename_without_hash_keeps_name() {
        assert_eq!(download_filename(Path::new("/d/plain.mp4"), false), "plain.mp4");
    }

    #[test]
    fn media_file_detection() {
        let exts = vec!["mp4".to_string(), "webm".to_string(), "mkv".to_string()];
        assert!(is_media_file(Path::new("a_1.mp4"), &exts));
        assert!(is_media_file(Path::new("a_1.MKV"), &exts));
        assert!(!is_media_file(Path::new("a_1.mp4.part"), &exts));
        assert!(!is_media_file(Path::new("notes"), &exts));
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type_for(Path::new("a.mp4")), "video/mp4");
        assert_eq!(content_type_for(Path::new("a.webm")), "video/webm");
        assert_eq!(content_type_for(Path::new("a.mkv")), "video/x-matroska");
        assert_eq!(content_type_for(Path::new("a.bin")), "application/octet-stream");
    }
}
