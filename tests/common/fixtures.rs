//! Fake download tools written as POSIX shell scripts

use std::path::{Path, PathBuf};

/// Behaves like yt-dlp for the arguments media-dl passes
///
/// Appends every invocation to `calls.log` next to the script, fills in
/// `%(title)s` and `%(ext)s` of the `-o` template, writes the file unless
/// `--skip-download` is given, and prints one line of metadata JSON.
pub const FAKE_TOOL_SCRIPT: &str = r#"#!/bin/sh
echo "$@" >> "$(dirname "$0")/calls.log"
out=""
fmt="mp4"
skip=0
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift 2 ;;
    --merge-output-format) fmt="$2"; shift 2 ;;
    --skip-download) skip=1; shift ;;
    *) shift ;;
  esac
done
if [ "$skip" -eq 0 ]; then
  file=$(printf '%s' "$out" | sed -e "s/%(title)s/Fake Clip/" -e "s/%(ext)s/$fmt/")
  printf 'fake media bytes' > "$file"
fi
printf '%s\n' '{"title":"Fake Clip","duration":212,"thumbnails":[{"url":"https://img.example.com/small.jpg","resolution":"small"},{"url":"https://img.example.com/medium.jpg","resolution":"medium"},{"url":"https://img.example.com/large.jpg","resolution":"large"}]}'
"#;

/// Exits non-zero the way yt-dlp does for an unavailable video
pub const FAILING_TOOL_SCRIPT: &str = r#"#!/bin/sh
echo "$@" >> "$(dirname "$0")/calls.log"
echo "ERROR: [generic] Unable to download webpage: HTTP Error 404: Not Found" >&2
exit 1
"#;

/// Write an executable script named `yt-dlp` into `dir`
#[cfg(unix)]
pub fn write_tool(dir: &Path, script: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join("yt-dlp");
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Invocations recorded by a fake tool in `dir`
pub fn tool_calls(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join("calls.log"))
        .map(|log| log.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Invocations that downloaded (not metadata-only)
pub fn download_calls(dir: &Path) -> usize {
    tool_calls(dir)
        .iter()
        .filter(|call| !call.contains("--skip-download"))
        .count()
}
