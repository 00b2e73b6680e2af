//! Release archive download and extraction
//!
//! Archives are streamed: the HTTP body is bridged into a blocking task that
//! runs it through a gzip decoder and a tar reader as bytes arrive. The first
//! stage to fail determines the reported [`FetchStage`].

#[cfg(test)]
use mockall::automock;

use std::cell::Cell;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;

use flate2::read::GzDecoder;
use futures::TryStreamExt;
use tokio::fs;
use tokio_util::io::{StreamReader, SyncIoBridge};
use tracing::{debug, trace};

use crate::boost::error::{FetchError, FetchStage};
use crate::config::{BOOST_ARCHIVE_BASE_URL, BOOST_TAG_PREFIX};
use crate::logging::HTTP_LOG_TARGET;

/// Where release archives are downloaded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseSource {
    /// Base URL of the organization hosting the repositories
    pub base_url: String,
    /// Prefix of release tag names
    pub tag_prefix: String,
}

impl ReleaseSource {
    pub fn new(base_url: &str, tag_prefix: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            tag_prefix: tag_prefix.to_string(),
        }
    }

    /// Archive URL for `repository` at release `version`
    ///
    /// e.g. `https://github.com/boostorg/asio/archive/boost-1.66.0.tar.gz`
    pub fn archive_url(&self, repository: &str, version: &str) -> String {
        format!(
            "{}/{}/archive/{}{}.tar.gz",
            self.base_url, repository, self.tag_prefix, version
        )
    }
}

impl Default for ReleaseSource {
    fn default() -> Self {
        Self::new(BOOST_ARCHIVE_BASE_URL, BOOST_TAG_PREFIX)
    }
}

/// Capability for downloading an archive into a directory
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait ArchiveFetcher: Send + Sync {
    /// Download the `.tar.gz` at `url` and extract it into `target_dir`,
    /// dropping the archive's top-level directory.
    ///
    /// `target_dir` is created if needed. On failure it may hold a partial tree.
    async fn fetch_and_extract(&self, url: &str, target_dir: &Path) -> Result<(), FetchError>;
}

/// Archive fetcher over HTTP(S)
pub struct HttpArchiveFetcher {
    client: reqwest::Client,
}

impl HttpArchiveFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpArchiveFetcher {
    fn default() -> Self {
        Self::new(
            reqwest::Client::builder()
                .user_agent(concat!("boost-downloader/", env!("CARGO_PKG_VERSION")))
                .build()
                .expect("Failed to create HTTP client"),
        )
    }
}

#[async_trait::async_trait]
impl ArchiveFetcher for HttpArchiveFetcher {
    async fn fetch_and_extract(&self, url: &str, target_dir: &Path) -> Result<(), FetchError> {
        fs::create_dir_all(target_dir)
            .await
            .map_err(|e| FetchError::new(url, FetchStage::CreateDir, e))?;

        debug!(target: HTTP_LOG_TARGET, "GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::new(url, FetchStage::Request, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                url,
                FetchStage::Request,
                format!("Unexpected status: {}", status),
            ));
        }

        let body = response.bytes_stream().map_err(io::Error::other);
        let reader = SyncIoBridge::new(StreamReader::new(Box::pin(body)));
        let dest = target_dir.to_path_buf();
        let extracted =
            tokio::task::spawn_blocking(move || extract_stream(reader, &dest)).await;
        debug!(target: HTTP_LOG_TARGET, "Finished reading {}", url);

        match extracted {
            Ok(Ok(())) => Ok(()),
            Ok(Err((stage, e))) => Err(FetchError::new(url, stage, e)),
            Err(e) => Err(FetchError::new(url, FetchStage::Extract, e)),
        }
    }
}

/// Records the first pipeline stage whose reader failed
struct StageReader<R> {
    inner: R,
    stage: FetchStage,
    failed: Rc<Cell<Option<FetchStage>>>,
}

impl<R: Read> Read for StageReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf).inspect_err(|_| {
            if self.failed.get().is_none() {
                self.failed.set(Some(self.stage));
            }
        })
    }
}

/// Decompress and extract a gzip'd tar stream into `dest`
fn extract_stream<R: Read>(reader: R, dest: &Path) -> Result<(), (FetchStage, io::Error)> {
    let failed = Rc::new(Cell::new(None));
    let network = StageReader {
        inner: reader,
        stage: FetchStage::Download,
        failed: failed.clone(),
    };
    let decompressed = StageReader {
        inner: GzDecoder::new(network),
        stage: FetchStage::Decompress,
        failed: failed.clone(),
    };

    extract_tar_stripped(decompressed, dest)
        .map_err(|e| (failed.get().unwrap_or(FetchStage::Extract), e))
}

/// Extract a tar stream into `dest`, removing the first path component of every entry.
///
/// Entries are never written through a symlink, and symlink targets must
/// resolve inside `dest`.
pub fn extract_tar_stripped<R: Read>(reader: R, dest: &Path) -> io::Result<()> {
    let mut archive = tar::Archive::new(reader);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_type = entry.header().entry_type();
        if matches!(
            entry_type,
            tar::EntryType::XGlobalHeader | tar::EntryType::XHeader
        ) {
            continue;
        }

        let path = entry.path()?.into_owned();
        let Some(relative) = strip_root(&path)? else {
            continue;
        };
        ensure_no_symlink_components(dest, &relative)?;
        let full_path = dest.join(&relative);

        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        match entry_type {
            tar::EntryType::Link => {
                // Hard link targets are archive paths, so they carry the root component too
                let target = entry
                    .link_name()?
                    .ok_or_else(|| invalid_data(format!("hard link without target: {:?}", path)))?
                    .into_owned();
                let Some(target) = strip_root(&target)? else {
                    return Err(invalid_data(format!("hard link to archive root: {:?}", path)));
                };
                ensure_no_symlink_components(dest, &target)?;
                let target = dest.join(target);
                if std::fs::hard_link(&target, &full_path).is_err() {
                    std::fs::copy(&target, &full_path)?;
                }
            }
            tar::EntryType::Symlink => {
                let target = entry
                    .link_name()?
                    .ok_or_else(|| invalid_data(format!("symlink without target: {:?}", path)))?
                    .into_owned();
                ensure_link_target_within(&relative, &target)?;
                entry.unpack(&full_path)?;
            }
            _ => {
                entry.unpack(&full_path)?;
            }
        }
        trace!("Extracted {:?}", relative);
    }

    Ok(())
}

/// Drop the first component of an archive path.
///
/// Returns `None` for the root itself and rejects paths escaping the destination.
fn strip_root(path: &Path) -> io::Result<Option<PathBuf>> {
    let mut components = path.components();
    components.next();
    let rest = components.as_path();

    if rest
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        || path.is_absolute()
    {
        return Err(invalid_data(format!("unsafe archive path: {:?}", path)));
    }

    let rest: PathBuf = rest
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect();
    if rest.as_os_str().is_empty() {
        Ok(None)
    } else {
        Ok(Some(rest))
    }
}

/// Fail if any existing component of `dest/relative`, the leaf included, is a symlink
fn ensure_no_symlink_components(dest: &Path, relative: &Path) -> io::Result<()> {
    let mut current = dest.to_path_buf();
    for component in relative.components() {
        current.push(component);
        let is_symlink = std::fs::symlink_metadata(&current)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false);
        if is_symlink {
            return Err(invalid_data(format!(
                "refusing to extract through symlink: {:?}",
                current
            )));
        }
    }
    Ok(())
}

/// Fail unless `target`, taken relative to the directory holding `link`,
/// stays inside the extraction root
///
/// `link` is relative to the root and holds only normal components.
fn ensure_link_target_within(link: &Path, target: &Path) -> io::Result<()> {
    let mut depth = link.parent().map_or(0, |p| p.components().count());

    for component in target.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    invalid_data(format!(
                        "symlink target escapes destination: {:?} -> {:?}",
                        link, target
                    ))
                })?;
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid_data(format!(
                    "absolute symlink target: {:?} -> {:?}",
                    link, target
                )));
            }
        }
    }

    Ok(())
}

fn invalid_data(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use mockito::Server;
    use rstest::rstest;
    use std::io::Write;
    use tempfile::TempDir;

    fn tarball(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, contents) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_entry_type(tar::EntryType::Regular);
            header.set_cksum();
            builder
                .append_data(&mut header, path, contents.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap()
    }

    /// Symlinks are appended before files, in the given order
    fn tarball_with_symlinks(symlinks: &[(&str, &str)], files: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, target) in symlinks {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Symlink);
            header.set_size(0);
            header.set_mode(0o777);
            builder.append_link(&mut header, path, target).unwrap();
        }
        for (path, contents) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_entry_type(tar::EntryType::Regular);
            builder
                .append_data(&mut header, path, contents.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn archive_url_follows_release_layout() {
        let source = ReleaseSource::default();
        assert_eq!(
            source.archive_url("boost", "1.66.0"),
            "https://github.com/boostorg/boost/archive/boost-1.66.0.tar.gz"
        );
        assert_eq!(
            source.archive_url("numeric_conversion", "1.66.0"),
            "https://github.com/boostorg/numeric_conversion/archive/boost-1.66.0.tar.gz"
        );
    }

    #[test]
    fn release_source_trims_trailing_slash() {
        let source = ReleaseSource::new("http://localhost:1234/", "boost-");
        assert_eq!(
            source.archive_url("build", "1.70.0"),
            "http://localhost:1234/build/archive/boost-1.70.0.tar.gz"
        );
    }

    #[test]
    fn strip_root_drops_first_component() {
        assert_eq!(
            strip_root(Path::new("boost-boost-1.66.0/libs/asio/README")).unwrap(),
            Some(PathBuf::from("libs/asio/README"))
        );
        assert_eq!(strip_root(Path::new("boost-boost-1.66.0/")).unwrap(), None);
        assert_eq!(strip_root(Path::new("pax_global_header")).unwrap(), None);
    }

    #[test]
    fn strip_root_rejects_parent_components() {
        assert!(strip_root(Path::new("root/../../etc/passwd")).is_err());
    }

    #[test]
    fn extract_tar_stripped_writes_tree_without_root() {
        let temp = TempDir::new().unwrap();
        let tar = tarball(&[
            ("boost-1.66.0/bootstrap.sh", "#!/bin/sh"),
            ("boost-1.66.0/libs/asio/include/asio.hpp", "// asio"),
        ]);

        extract_tar_stripped(tar.as_slice(), temp.path()).unwrap();

        assert_eq!(
            std::fs::read_to_string(temp.path().join("bootstrap.sh")).unwrap(),
            "#!/bin/sh"
        );
        assert!(temp.path().join("libs/asio/include/asio.hpp").is_file());
        assert!(!temp.path().join("boost-1.66.0").exists());
    }

    #[test]
    fn extract_stream_reports_decompress_stage_for_corrupt_gzip() {
        let temp = TempDir::new().unwrap();
        let garbage = b"this is definitely not gzip data".to_vec();

        let (stage, _) = extract_stream(garbage.as_slice(), temp.path()).unwrap_err();

        assert_eq!(stage, FetchStage::Decompress);
    }

    #[test]
    fn extract_stream_reports_extract_stage_for_corrupt_tar() {
        let temp = TempDir::new().unwrap();
        let not_tar = gzip(&[0xAB; 1024]);

        let (stage, _) = extract_stream(not_tar.as_slice(), temp.path()).unwrap_err();

        assert_eq!(stage, FetchStage::Extract);
    }

    #[test]
    fn extract_stream_reports_download_stage_for_reader_failure() {
        struct FailingReader;
        impl Read for FailingReader {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::other("connection reset"))
            }
        }
        let temp = TempDir::new().unwrap();

        let (stage, _) = extract_stream(FailingReader, temp.path()).unwrap_err();

        assert_eq!(stage, FetchStage::Download);
    }

    #[tokio::test]
    async fn http_fetcher_downloads_and_extracts_archive() {
        let mut server = Server::new_async().await;
        let body = gzip(&tarball(&[
            ("build-boost-1.66.0/Jamroot", "project build ;"),
            ("build-boost-1.66.0/src/engine/build.sh", "echo"),
        ]));
        let mock = server
            .mock("GET", "/build/archive/boost-1.66.0.tar.gz")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("tools").join("build");
        let url = ReleaseSource::new(&server.url(), "boost-").archive_url("build", "1.66.0");

        HttpArchiveFetcher::default()
            .fetch_and_extract(&url, &target)
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(target.join("Jamroot").is_file());
        assert!(target.join("src/engine/build.sh").is_file());
    }

    #[tokio::test]
    async fn http_fetcher_reports_request_stage_for_not_found() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/missing/archive/boost-1.66.0.tar.gz")
            .with_status(404)
            .create_async()
            .await;
        let temp = TempDir::new().unwrap();
        let url = format!("{}/missing/archive/boost-1.66.0.tar.gz", server.url());

        let err = HttpArchiveFetcher::default()
            .fetch_and_extract(&url, temp.path())
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert_eq!(err.stage, FetchStage::Request);
        assert_eq!(err.url, url);
    }

    #[tokio::test]
    async fn http_fetcher_reports_decompress_stage_for_corrupt_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/asio/archive/boost-1.66.0.tar.gz")
            .with_status(200)
            .with_body("<html>not an archive</html>")
            .create_async()
            .await;
        let temp = TempDir::new().unwrap();
        let url = format!("{}/asio/archive/boost-1.66.0.tar.gz", server.url());

        let err = HttpArchiveFetcher::default()
            .fetch_and_extract(&url, temp.path())
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert_eq!(err.stage, FetchStage::Decompress);
    }

    #[tokio::test]
    async fn http_fetcher_reports_request_stage_for_unreachable_host() {
        let temp = TempDir::new().unwrap();

        let err = HttpArchiveFetcher::default()
            .fetch_and_extract("http://127.0.0.1:1/boost.tar.gz", temp.path())
            .await
            .unwrap_err();

        assert_eq!(err.stage, FetchStage::Request);
        assert!(temp.path().is_dir());
    }

    #[test]
    fn extract_tar_stripped_rejects_symlink_escaping_destination() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("cache").join("1.66.0");
        let tar = tarball_with_symlinks(
            &[("boost-1.66.0/libs/evil", "../..")],
            &[("boost-1.66.0/libs/evil/escaped.txt", "pwned")],
        );

        let err = extract_tar_stripped(tar.as_slice(), &dest).unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(!temp.path().join("cache").join("escaped.txt").exists());
        assert!(!dest.join("libs/evil").exists());
    }

    #[cfg(unix)]
    #[test]
    fn extract_tar_stripped_rejects_writing_through_symlink() {
        let temp = TempDir::new().unwrap();
        let outside = temp.path().join("outside");
        std::fs::create_dir_all(&outside).unwrap();
        let dest = temp.path().join("1.66.0");
        std::fs::create_dir_all(dest.join("libs")).unwrap();
        std::os::unix::fs::symlink(&outside, dest.join("libs/asio")).unwrap();
        let tar = tarball(&[("asio-boost-1.66.0/libs/asio/asio.hpp", "// asio")]);

        let err = extract_tar_stripped(tar.as_slice(), &dest).unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(!outside.join("asio.hpp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn extract_tar_stripped_keeps_symlinks_inside_destination() {
        let temp = TempDir::new().unwrap();
        let tar = tarball_with_symlinks(
            &[("boost-1.66.0/include/boost", "../boost")],
            &[("boost-1.66.0/boost/version.hpp", "// version")],
        );

        extract_tar_stripped(tar.as_slice(), temp.path()).unwrap();

        let link = temp.path().join("include/boost");
        assert!(
            std::fs::symlink_metadata(&link)
                .unwrap()
                .file_type()
                .is_symlink()
        );
        assert!(link.join("version.hpp").is_file());
    }

    #[rstest]
    #[case("libs/alias", "asio", true)]
    #[case("libs/alias", "../boost", true)]
    #[case("libs/alias", "..", true)]
    #[case("libs/alias", "../..", false)]
    #[case("top", "..", false)]
    #[case("libs/alias", "asio/../../../etc", false)]
    #[case("libs/alias", "/etc/passwd", false)]
    fn link_targets_must_stay_inside_destination(
        #[case] link: &str,
        #[case] target: &str,
        #[case] allowed: bool,
    ) {
        let result = ensure_link_target_within(Path::new(link), Path::new(target));
        assert_eq!(result.is_ok(), allowed);
    }
}
