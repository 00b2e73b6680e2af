use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Boost version range is required")]
    MissingVersion,

    #[error("Invalid Boost version range: {0}")]
    InvalidRange(String),

    #[error("Cannot determine a cache directory: no home directory available")]
    NoCacheDir,
}

#[derive(Debug, Error)]
pub enum RemoteListError {
    #[error("Failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("`{command}` produced non UTF-8 output")]
    InvalidOutput { command: String },

    #[error("No tags listed for {0}")]
    Empty(String),
}

/// Stage of the download pipeline that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStage {
    CreateDir,
    Request,
    Download,
    Decompress,
    Extract,
}

impl fmt::Display for FetchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            FetchStage::CreateDir => "create directory",
            FetchStage::Request => "request",
            FetchStage::Download => "download",
            FetchStage::Decompress => "decompress",
            FetchStage::Extract => "extract",
        };
        f.write_str(stage)
    }
}

#[derive(Debug, Error)]
#[error("Failed to fetch {url} ({stage}): {message}")]
pub struct FetchError {
    pub url: String,
    pub stage: FetchStage,
    pub message: String,
}

impl FetchError {
    pub fn new(url: &str, stage: FetchStage, message: impl fmt::Display) -> Self {
        Self {
            url: url.to_string(),
            stage,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Cannot create cache directory {path:?}: {source}")]
    CacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to list Boost releases: {0}")]
    RemoteList(#[from] RemoteListError),

    #[error("No Boost release satisfies {range}")]
    NoMatch { range: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),
}
