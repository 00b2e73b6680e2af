use serde::Deserialize;
use std::path::PathBuf;

use crate::boost::archive::ReleaseSource;
use crate::boost::error::ConfigError;
use crate::boost::range::VersionRange;

// =============================================================================
// Upstream layout
// =============================================================================

/// Organization hosting the main repository and every sub-library
pub const BOOST_ARCHIVE_BASE_URL: &str = "https://github.com/boostorg";

/// Main repository, queried for release tags
pub const BOOST_REPOSITORY_URL: &str = "https://github.com/boostorg/boost.git";

/// Repository name of the main package
pub const BOOST_MAIN_REPOSITORY: &str = "boost";

/// Release tags are named `boost-<version>`
pub const BOOST_TAG_PREFIX: &str = "boost-";

/// Repository name prefix of the `libs/numeric` sub-libraries
pub const NUMERIC_REPOSITORY_PREFIX: &str = "numeric_";

/// Delay between starting each sub-library fetch (10ms)
pub const FETCH_STAGGER_DELAY_MS: u64 = 10;

/// Environment variable overriding the default cache directory
pub const CACHE_DIR_ENV: &str = "BOOST_DOWNLOADER_CACHE_DIR";

/// Options as supplied by the embedding build tool
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct DownloaderOptions {
    /// Version range to resolve, e.g. "1.66.0" or "^1.65"
    pub version: Option<String>,
    /// Cache root directory
    pub directory: Option<PathBuf>,
    /// Optional log file
    pub log_file: Option<PathBuf>,
    /// Base URL of release archives, for mirrors
    pub archive_base_url: Option<String>,
    /// Repository queried for release tags, for mirrors
    pub repository_url: Option<String>,
}

impl DownloaderOptions {
    /// Overlay `other` on top of `self`; fields set in `other` win
    pub fn merge(self, other: DownloaderOptions) -> Self {
        Self {
            version: other.version.or(self.version),
            directory: other.directory.or(self.directory),
            log_file: other.log_file.or(self.log_file),
            archive_base_url: other.archive_base_url.or(self.archive_base_url),
            repository_url: other.repository_url.or(self.repository_url),
        }
    }
}

/// Validated downloader configuration. Immutable once built.
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    pub version_range: VersionRange,
    pub cache_dir: PathBuf,
    pub repository_url: String,
    pub source: ReleaseSource,
}

impl DownloaderConfig {
    pub fn new(version_range: VersionRange, cache_dir: PathBuf) -> Self {
        Self {
            version_range,
            cache_dir,
            repository_url: BOOST_REPOSITORY_URL.to_string(),
            source: ReleaseSource::default(),
        }
    }

    /// Validate options, filling in defaults.
    ///
    /// Fails if no version range is given or it cannot be parsed.
    pub fn from_options(options: DownloaderOptions) -> Result<Self, ConfigError> {
        let version_range: VersionRange = options
            .version
            .as_deref()
            .ok_or(ConfigError::MissingVersion)?
            .parse()?;

        let cache_dir = match options.directory {
            Some(dir) => dir,
            None => default_cache_dir()?,
        };

        let mut config = Self::new(version_range, cache_dir);
        if let Some(url) = options.repository_url {
            config.repository_url = url;
        }
        if let Some(base_url) = options.archive_base_url {
            config.source = ReleaseSource::new(&base_url, BOOST_TAG_PREFIX);
        }
        Ok(config)
    }
}

/// Returns the default cache root.
/// Uses $BOOST_DOWNLOADER_CACHE_DIR if set,
/// otherwise falls back to ~/.boost-downloader/boost.
pub fn default_cache_dir() -> Result<PathBuf, ConfigError> {
    cache_dir_with_env(std::env::var(CACHE_DIR_ENV).ok(), dirs::home_dir())
}

fn cache_dir_with_env(
    env_override: Option<String>,
    home_dir: Option<PathBuf>,
) -> Result<PathBuf, ConfigError> {
    if let Some(dir) = env_override.filter(|d| !d.trim().is_empty()) {
        return Ok(PathBuf::from(dir));
    }

    home_dir
        .map(|home| home.join(".boost-downloader").join("boost"))
        .ok_or(ConfigError::NoCacheDir)
}
