//! Logging setup
//!
//! Levels used across the crate:
//! - `info`: progress a user cares about (resolved version, fetch progress)
//! - `debug`: cache decisions and version comparisons
//! - `debug` on [`HTTP_LOG_TARGET`]: network traffic
//! - `trace`: per-entry detail (tag lines, extracted files)

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, fmt};

/// Target for network request logging, filterable on its own
pub const HTTP_LOG_TARGET: &str = "boost_downloader::http";

/// Default filter directive for a `-v` count
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "boost_downloader=info",
        1 => "boost_downloader=debug",
        _ => "boost_downloader=trace",
    }
}

/// Install the global subscriber.
///
/// Human-readable output goes to stderr, filtered by `RUST_LOG` or the
/// verbosity default. With `log_file`, every event at debug and above is
/// also written there as JSON lines; keep the returned guard alive so the
/// file writer is flushed.
pub fn init(verbosity: u8, log_file: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let stderr_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(stderr_filter);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
            let dir = dir.unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(dir)?;
            let file_name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("Invalid log file path: {:?}", path))?;

            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(EnvFilter::new("boost_downloader=debug"));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}
