//! Resolve, download, and cache Boost C++ source trees.
//!
//! ```no_run
//! use boost_downloader::boost::downloader::BoostDownloader;
//! use boost_downloader::config::{DownloaderConfig, DownloaderOptions};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = DownloaderConfig::from_options(DownloaderOptions {
//!     version: Some("1.66.0".to_string()),
//!     ..Default::default()
//! })?;
//! let path = BoostDownloader::new(config).ensure_downloaded().await?;
//! println!("Boost is at {}", path.display());
//! # Ok(())
//! # }
//! ```

pub mod boost;
pub mod config;
pub mod logging;
