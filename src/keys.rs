//! Key namespaces in the expiring key-value store
//!
//! Every piece of shared state lives under a purpose prefix so the sweeper can
//! scan one namespace at a time.

use std::path::Path;

use crate::types::TaskId;

/// Common prefix of every key written by this crate
pub const ROOT: &str = "media:";

/// Last-access markers: presence protects a file from eviction
pub const LAST_REQUEST_PREFIX: &str = "media:lastrequest:";

/// Cached title/thumbnail/duration JSON per file
pub const METADATA_PREFIX: &str = "media:metadata:";

/// Reader counts per file
pub const REFCOUNT_PREFIX: &str = "media:refcount:";

/// Task records
pub const TASK_PREFIX: &str = "media:task:";

/// In-flight download claims per content hash
pub const CLAIM_PREFIX: &str = "media:claim:";

pub fn last_request(path: &Path) -> String {
    format!("{}{}", LAST_REQUEST_PREFIX, path.display())
}

pub fn metadata(path: &Path) -> String {
    format!("{}{}", METADATA_PREFIX, path.display())
}

pub fn refcount(path: &Path) -> String {
    format!("{}{}", REFCOUNT_PREFIX, path.display())
}

pub fn task(id: &TaskId) -> String {
    format!("{}{}", TASK_PREFIX, id)
}

pub fn claim(hash: &str) -> String {
    format!("{}{}", CLAIM_PREFIX, hash)
}

/// Recover the file path from a last-access marker key
pub fn path_from_last_request(key: &str) -> Option<&Path> {
    key.strip_prefix(LAST_REQUEST_PREFIX).map(Path::new)
}
