//! Fake collaborators and archive builders for downloader tests

#![allow(dead_code)]

pub mod archive;

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use boost_downloader::boost::archive::ArchiveFetcher;
use boost_downloader::boost::error::{FetchError, FetchStage, RemoteListError};
use boost_downloader::boost::remote::TagLister;

/// Tag lister returning a canned `git ls-remote` listing
pub struct FakeTagLister {
    result: Result<String, String>,
    calls: AtomicUsize,
}

impl FakeTagLister {
    pub fn with_tags(tags: &[&str]) -> Self {
        let output = tags
            .iter()
            .map(|t| format!("9f3c2a7e5b1d4c6f8a0e2b4d6f8a0c2e4b6d8f0a\trefs/tags/{}\n", t))
            .collect();
        Self {
            result: Ok(output),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(stderr: &str) -> Self {
        Self {
            result: Err(stderr.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TagLister for FakeTagLister {
    async fn ls_remote_tags(&self, _repository_url: &str) -> Result<String, RemoteListError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone().map_err(|stderr| RemoteListError::Failed {
            command: "git ls-remote --tags".to_string(),
            status: "exit status: 128".to_string(),
            stderr,
        })
    }
}

/// Archive fetcher that materializes a fixed file list per URL
///
/// Paths ending in `/` become directories, everything else an empty file.
/// URLs without a registered layout get a single `README.md`.
#[derive(Default)]
pub struct FakeArchiveFetcher {
    layouts: HashMap<String, Vec<String>>,
    failing: HashSet<String>,
    requests: Mutex<Vec<String>>,
}

impl FakeArchiveFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_archive(mut self, url: &str, paths: &[&str]) -> Self {
        self.layouts.insert(
            url.to_string(),
            paths.iter().map(|p| p.to_string()).collect(),
        );
        self
    }

    pub fn failing_for(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    /// URLs requested so far, in request order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArchiveFetcher for FakeArchiveFetcher {
    async fn fetch_and_extract(&self, url: &str, target_dir: &Path) -> Result<(), FetchError> {
        self.requests.lock().unwrap().push(url.to_string());
        std::fs::create_dir_all(target_dir)
            .map_err(|e| FetchError::new(url, FetchStage::CreateDir, e))?;

        if self.failing.contains(url) {
            return Err(FetchError::new(url, FetchStage::Download, "connection reset"));
        }

        let default_layout = vec!["README.md".to_string()];
        let layout = self.layouts.get(url).unwrap_or(&default_layout);
        for path in layout {
            let full = target_dir.join(path);
            if path.ends_with('/') {
                std::fs::create_dir_all(&full).unwrap();
            } else {
                std::fs::create_dir_all(full.parent().unwrap()).unwrap();
                std::fs::write(&full, "").unwrap();
            }
        }
        Ok(())
    }
}
