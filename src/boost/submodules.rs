//! Sub-library fetching
//!
//! The main Boost archive only carries empty placeholders for its modular
//! sub-libraries. Each one lives in its own repository and is fetched into
//! its placeholder. Individual failures are logged and reported, never
//! propagated: a partially populated tree is still a usable download.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use futures::future::join_all;
use futures::stream::FuturesUnordered;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::boost::archive::{ArchiveFetcher, ReleaseSource};
use crate::boost::cache::{has_entries, list_dir_names};
use crate::boost::error::FetchError;
use crate::config::{FETCH_STAGGER_DELAY_MS, NUMERIC_REPOSITORY_PREFIX};

/// How the members of a group are determined
#[derive(Debug, Clone, Copy)]
pub enum GroupMembers {
    /// Always the given names
    Fixed(&'static [&'static str]),
    /// Every directory present in the group directory, minus the excluded names
    Discovered { exclude: &'static [&'static str] },
}

/// A directory of sub-libraries sharing a repository naming scheme
#[derive(Debug, Clone, Copy)]
pub struct SubmoduleGroup {
    /// Group directory relative to the package root
    pub dir: &'static str,
    /// Prepended to a member's name to form its repository name
    pub repository_prefix: &'static str,
    pub members: GroupMembers,
}

/// Sub-library layout of a Boost release
pub const SUBMODULE_GROUPS: &[SubmoduleGroup] = &[
    SubmoduleGroup {
        dir: "tools",
        repository_prefix: "",
        members: GroupMembers::Fixed(&["build", "inspect"]),
    },
    SubmoduleGroup {
        dir: "libs",
        repository_prefix: "",
        members: GroupMembers::Discovered {
            exclude: &["numeric"],
        },
    },
    SubmoduleGroup {
        dir: "libs/numeric",
        repository_prefix: NUMERIC_REPOSITORY_PREFIX,
        members: GroupMembers::Discovered { exclude: &[] },
    },
];

/// One sub-library fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubLibraryTask {
    pub name: String,
    pub target_dir: PathBuf,
    pub url: String,
}

impl SubLibraryTask {
    pub fn new(
        source: &ReleaseSource,
        version: &str,
        parent_dir: &Path,
        name: &str,
        repository_prefix: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            target_dir: parent_dir.join(name),
            url: source.archive_url(&format!("{}{}", repository_prefix, name), version),
        }
    }
}

/// Result of a single sub-library fetch
#[derive(Debug)]
pub enum SubFetchOutcome {
    /// Target already had content
    Skipped,
    Fetched,
    Failed(FetchError),
}

/// Outcome of a whole orchestration, keyed by path relative to the package root
#[derive(Debug, Default)]
pub struct SubmoduleReport {
    pub fetched: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<(String, FetchError)>,
}

impl SubmoduleReport {
    fn record(&mut self, name: String, outcome: SubFetchOutcome) {
        match outcome {
            SubFetchOutcome::Skipped => self.skipped.push(name),
            SubFetchOutcome::Fetched => self.fetched.push(name),
            SubFetchOutcome::Failed(e) => self.failed.push((name, e)),
        }
    }

    /// Number of sub-libraries that are in place after the run
    pub fn available(&self) -> usize {
        self.fetched.len() + self.skipped.len()
    }

    pub fn total(&self) -> usize {
        self.available() + self.failed.len()
    }
}

/// Fetch one sub-library into `parent_dir/name` unless it already has content
pub async fn fetch_one(
    fetcher: &dyn ArchiveFetcher,
    source: &ReleaseSource,
    version: &str,
    parent_dir: &Path,
    name: &str,
    repository_prefix: &str,
) -> SubFetchOutcome {
    let task = SubLibraryTask::new(source, version, parent_dir, name, repository_prefix);

    if has_entries(&task.target_dir).await {
        debug!("Sub-library {} already present at {:?}", task.name, task.target_dir);
        return SubFetchOutcome::Skipped;
    }

    match fetcher.fetch_and_extract(&task.url, &task.target_dir).await {
        Ok(()) => {
            debug!("Fetched sub-library {} into {:?}", task.name, task.target_dir);
            SubFetchOutcome::Fetched
        }
        Err(e) => {
            error!("Failed to fetch sub-library {}: {}", task.name, e);
            SubFetchOutcome::Failed(e)
        }
    }
}

/// Names of the members of `group` under `root_dir`
pub async fn group_members(root_dir: &Path, group: &SubmoduleGroup) -> Vec<String> {
    match group.members {
        GroupMembers::Fixed(names) => names.iter().map(|n| n.to_string()).collect(),
        GroupMembers::Discovered { exclude } => list_dir_names(&root_dir.join(group.dir))
            .await
            .into_iter()
            .filter(|name| !exclude.contains(&name.as_str()))
            .collect(),
    }
}

/// Fetch every member of `group` concurrently, reporting progress as each settles
pub async fn fetch_group(
    fetcher: &dyn ArchiveFetcher,
    source: &ReleaseSource,
    version: &str,
    root_dir: &Path,
    group: &SubmoduleGroup,
) -> Vec<(String, SubFetchOutcome)> {
    let names = group_members(root_dir, group).await;
    let total = names.len();
    if total == 0 {
        debug!("No sub-libraries found in {}", group.dir);
        return Vec::new();
    }

    info!("Fetching {} sub-libraries in {}", total, group.dir);
    let parent_dir = root_dir.join(group.dir);

    let mut pending: FuturesUnordered<_> = names
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let delay = Duration::from_millis(FETCH_STAGGER_DELAY_MS * i as u64);
            let parent_dir = &parent_dir;
            async move {
                sleep(delay).await;
                let outcome = fetch_one(
                    fetcher,
                    source,
                    version,
                    parent_dir,
                    &name,
                    group.repository_prefix,
                )
                .await;
                (format!("{}/{}", group.dir, name), outcome)
            }
        })
        .collect();

    let mut settled = Vec::with_capacity(total);
    while let Some(result) = pending.next().await {
        settled.push(result);
        info!(
            "{}: {}% done ({}/{})",
            group.dir,
            settled.len() * 100 / total,
            settled.len(),
            total
        );
    }

    settled
}

/// Fetch all sub-libraries of the package at `root_dir`. Never fails.
pub async fn fetch_submodules(
    fetcher: &dyn ArchiveFetcher,
    source: &ReleaseSource,
    version: &str,
    root_dir: &Path,
) -> SubmoduleReport {
    let groups = SUBMODULE_GROUPS
        .iter()
        .map(|group| fetch_group(fetcher, source, version, root_dir, group));

    let mut report = SubmoduleReport::default();
    for (name, outcome) in join_all(groups).await.into_iter().flatten() {
        report.record(name, outcome);
    }

    info!(
        "Sub-libraries of Boost {}: {} fetched, {} already present, {} failed",
        version,
        report.fetched.len(),
        report.skipped.len(),
        report.failed.len()
    );
    report
}
