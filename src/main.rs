use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use boost_downloader::boost::downloader::BoostDownloader;
use boost_downloader::config::{DownloaderConfig, DownloaderOptions};
use boost_downloader::logging;

#[derive(Parser)]
#[command(name = "boost-downloader")]
#[command(version, about = "Download and cache a Boost source tree matching a version range")]
struct Cli {
    /// Version range to resolve, e.g. "1.66.0" or ">=1.65 <1.70"
    range: Option<String>,

    /// Cache root directory [default: ~/.boost-downloader/boost]
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// JSON file with downloader options; command-line values take precedence
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Also write JSON logs to this file
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn options(&self) -> anyhow::Result<DownloaderOptions> {
        let file_options = match &self.config {
            Some(path) => {
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                serde_json::from_str(&contents)
                    .with_context(|| format!("Invalid options in {}", path.display()))?
            }
            None => DownloaderOptions::default(),
        };

        Ok(file_options.merge(DownloaderOptions {
            version: self.range.clone(),
            directory: self.cache_dir.clone(),
            log_file: self.log_file.clone(),
            ..Default::default()
        }))
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let options = cli.options()?;
    let _guard = logging::init(cli.verbose, options.log_file.as_deref())?;

    let config = DownloaderConfig::from_options(options)?;
    let downloader = BoostDownloader::new(config);

    let path = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(downloader.ensure_downloaded())?;

    println!("{}", path.display());
    Ok(())
}
