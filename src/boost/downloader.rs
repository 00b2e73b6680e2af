//! Entry point: make a Boost source tree satisfying the configured range
//! available under the cache root.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tracing::{debug, info, warn};

use crate::boost::archive::{ArchiveFetcher, HttpArchiveFetcher};
use crate::boost::cache::{CacheEntry, Stage, find_cached};
use crate::boost::error::DownloadError;
use crate::boost::remote::{GitTagLister, TagLister, list_tags, resolve_release};
use crate::boost::submodules::{SubmoduleReport, fetch_submodules};
use crate::config::{BOOST_MAIN_REPOSITORY, DownloaderConfig};

/// A Boost tree available on disk
#[derive(Debug)]
pub struct BoostTree {
    /// `<cache_dir>/<version>`
    pub path: PathBuf,
    pub version: String,
    /// Set when sub-libraries were (re)checked during this call
    pub submodules: Option<SubmoduleReport>,
}

pub struct BoostDownloader {
    config: DownloaderConfig,
    lister: Arc<dyn TagLister>,
    fetcher: Arc<dyn ArchiveFetcher>,
}

impl BoostDownloader {
    /// Downloader using `git` for tag listing and HTTPS for archives
    pub fn new(config: DownloaderConfig) -> Self {
        Self::build(
            config,
            Arc::new(GitTagLister::default()),
            Arc::new(HttpArchiveFetcher::default()),
        )
    }

    /// Build a downloader with custom collaborators
    pub fn build(
        config: DownloaderConfig,
        lister: Arc<dyn TagLister>,
        fetcher: Arc<dyn ArchiveFetcher>,
    ) -> Self {
        Self {
            config,
            lister,
            fetcher,
        }
    }

    /// Ensure a tree satisfying the version range exists and return its path.
    pub async fn ensure_downloaded(&self) -> Result<PathBuf, DownloadError> {
        self.resolve().await.map(|tree| tree.path)
    }

    /// Like [`Self::ensure_downloaded`], also reporting what happened to sub-libraries.
    ///
    /// A usable cached tree is returned without listing releases. An
    /// initialized tree needs no network access at all; a bootstrapped one
    /// gets its missing sub-libraries fetched. Otherwise the newest matching
    /// release is downloaded. Sub-library failures never fail the call.
    pub async fn resolve(&self) -> Result<BoostTree, DownloadError> {
        let cache_dir = &self.config.cache_dir;
        let range = &self.config.version_range;
        info!("Searching for Boost {} in {:?}", range, cache_dir);

        fs::create_dir_all(cache_dir)
            .await
            .map_err(|source| DownloadError::CacheDir {
                path: cache_dir.clone(),
                source,
            })?;

        if let Some(entry) = find_cached(cache_dir, range).await {
            if entry.stage.is_usable() {
                return Ok(self.reuse(entry).await);
            }
            debug!(
                "Cached Boost {} at {:?} is incomplete ({:?})",
                entry.version, entry.path, entry.stage
            );
        }

        self.download().await
    }

    /// Use a cached tree, re-checking sub-libraries unless it is initialized
    async fn reuse(&self, entry: CacheEntry) -> BoostTree {
        let submodules = if entry.stage == Stage::Initialized {
            info!("Boost {} is ready at {:?}", entry.version, entry.path);
            None
        } else {
            info!(
                "Boost {} found at {:?}, checking sub-libraries",
                entry.version, entry.path
            );
            Some(self.fetch_submodules(&entry.version, &entry.path).await)
        };

        BoostTree {
            path: entry.path,
            version: entry.version,
            submodules,
        }
    }

    async fn download(&self) -> Result<BoostTree, DownloadError> {
        let range = &self.config.version_range;
        let source = &self.config.source;

        let tags = list_tags(
            self.lister.as_ref(),
            &self.config.repository_url,
            &source.tag_prefix,
        )
        .await?;
        let tag = resolve_release(&tags, range).ok_or_else(|| DownloadError::NoMatch {
            range: range.to_string(),
        })?;

        let path = self.config.cache_dir.join(&tag.version);
        let url = source.archive_url(BOOST_MAIN_REPOSITORY, &tag.version);
        info!("Downloading Boost {} from {}", tag.version, url);
        self.fetcher.fetch_and_extract(&url, &path).await?;

        let report = self.fetch_submodules(&tag.version, &path).await;
        info!("Boost {} downloaded to {:?}", tag.version, path);

        Ok(BoostTree {
            path,
            version: tag.version,
            submodules: Some(report),
        })
    }

    async fn fetch_submodules(&self, version: &str, path: &Path) -> SubmoduleReport {
        let report =
            fetch_submodules(self.fetcher.as_ref(), &self.config.source, version, path).await;
        if !report.failed.is_empty() {
            warn!(
                "{} of {} Boost sub-libraries could not be fetched",
                report.failed.len(),
                report.total()
            );
        }
        report
    }
}
