//! On-disk cache inspection
//!
//! The cache root holds one directory per Boost version, named after the
//! version. A directory's lifecycle stage is derived from marker files at its
//! root and is never stored anywhere.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, trace};

use crate::boost::matcher::sort_newest_first;
use crate::boost::range::VersionRange;
use crate::boost::semver::valid;

/// Build driver produced by bootstrapping
#[cfg(windows)]
pub const BUILD_DRIVER: &str = "b2.exe";
#[cfg(not(windows))]
pub const BUILD_DRIVER: &str = "b2";

/// Bootstrap script shipped with the main package
#[cfg(windows)]
pub const BOOTSTRAP_SCRIPT: &str = "bootstrap.bat";
#[cfg(not(windows))]
pub const BOOTSTRAP_SCRIPT: &str = "bootstrap.sh";

/// Lifecycle stage of a cache directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Missing, empty, or unreadable
    Absent,
    /// Has content but no lifecycle marker
    RawDownload,
    /// Bootstrap script present, build driver not yet built
    Bootstrapped,
    /// Build driver present
    Initialized,
}

impl Stage {
    /// Whether the main package can be used without downloading it again
    pub fn is_usable(self) -> bool {
        matches!(self, Stage::Bootstrapped | Stage::Initialized)
    }
}

/// A version directory found under the cache root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub path: PathBuf,
    pub version: String,
    pub stage: Stage,
}

/// Classify a directory. Never fails: filesystem errors count as "not present".
pub async fn classify(path: &Path) -> Stage {
    if is_file(&path.join(BUILD_DRIVER)).await {
        return Stage::Initialized;
    }
    if is_file(&path.join(BOOTSTRAP_SCRIPT)).await {
        return Stage::Bootstrapped;
    }
    if has_entries(path).await {
        Stage::RawDownload
    } else {
        Stage::Absent
    }
}

/// Find the cached version directory to use for `range`.
///
/// The newest satisfying directory that is usable wins. When none is usable
/// the newest satisfying one is returned with its stage. Returns `None` if
/// the cache root cannot be listed or nothing matches.
pub async fn find_cached(cache_dir: &Path, range: &VersionRange) -> Option<CacheEntry> {
    let names = list_dir_names(cache_dir).await;
    debug!("Comparing cached versions {:?} against {}", names, range);

    let mut newest_unusable = None;
    for version in sort_newest_first(&names) {
        if !valid(&version).is_some_and(|v| range.satisfies(&v)) {
            continue;
        }

        let path = cache_dir.join(&version);
        let stage = classify(&path).await;
        debug!("Found cached Boost {} at {:?} ({:?})", version, path, stage);
        let entry = CacheEntry {
            path,
            version,
            stage,
        };
        if stage.is_usable() {
            return Some(entry);
        }
        if newest_unusable.is_none() {
            newest_unusable = Some(entry);
        }
    }

    newest_unusable
}

/// Whether `path` is a directory with at least one entry
pub async fn has_entries(path: &Path) -> bool {
    match fs::read_dir(path).await {
        Ok(mut entries) => matches!(entries.next_entry().await, Ok(Some(_))),
        Err(e) => {
            trace!("Cannot list {:?}: {}", path, e);
            false
        }
    }
}

/// Names of the child directories of `path`, excluding symlinks.
///
/// Unreadable entries are skipped; an unreadable `path` yields an empty list.
pub async fn list_dir_names(path: &Path) -> Vec<String> {
    let mut names = Vec::new();
    let Ok(mut entries) = fs::read_dir(path).await else {
        return names;
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let is_dir = entry
            .file_type()
            .await
            .map(|t| t.is_dir())
            .unwrap_or(false);
        if !is_dir {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }

    names.sort();
    names
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}
