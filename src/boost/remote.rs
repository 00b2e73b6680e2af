//! Remote release listing
//!
//! Releases are discovered from the tags of the main Boost repository,
//! listed with `git ls-remote` so nothing is cloned.

#[cfg(test)]
use mockall::automock;

use regex::Regex;
use tokio::process::Command;
use tracing::{debug, trace};

use crate::boost::error::RemoteListError;
use crate::boost::matcher::find_satisfying;
use crate::boost::range::VersionRange;
use crate::boost::semver::valid;
use crate::logging::HTTP_LOG_TARGET;

/// A release tag of the main repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTag {
    /// Full tag name, e.g. "boost-1.66.0"
    pub name: String,
    /// Tag name without the release prefix, e.g. "1.66.0"
    pub version: String,
}

/// Capability for listing the tags of a remote repository
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait TagLister: Send + Sync {
    /// Returns the raw `<sha>\trefs/tags/<tag>` listing
    async fn ls_remote_tags(&self, repository_url: &str) -> Result<String, RemoteListError>;
}

/// Lists tags by running `git ls-remote --tags`
pub struct GitTagLister {
    git: String,
}

impl GitTagLister {
    /// Creates a lister that runs the given git executable
    pub fn new(git: &str) -> Self {
        Self {
            git: git.to_string(),
        }
    }
}

impl Default for GitTagLister {
    fn default() -> Self {
        Self::new("git")
    }
}

#[async_trait::async_trait]
impl TagLister for GitTagLister {
    async fn ls_remote_tags(&self, repository_url: &str) -> Result<String, RemoteListError> {
        let command = format!("{} ls-remote --tags {}", self.git, repository_url);
        debug!(target: HTTP_LOG_TARGET, "Running {}", command);

        let output = Command::new(&self.git)
            .args(["ls-remote", "--tags", repository_url])
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .await
            .map_err(|source| RemoteListError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(RemoteListError::Failed {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        String::from_utf8(output.stdout).map_err(|_| RemoteListError::InvalidOutput { command })
    }
}

/// Parser for `git ls-remote --tags` output
pub struct TagLineParser {
    line_re: Regex,
    tag_prefix: String,
}

impl TagLineParser {
    pub fn new(tag_prefix: &str) -> Self {
        Self {
            // `<sha>\trefs/tags/<name>`, optionally peeled with `^{}`
            line_re: Regex::new(r"^([0-9a-fA-F]+)\trefs/tags/(.+?)(\^\{\})?$").unwrap(),
            tag_prefix: tag_prefix.to_string(),
        }
    }

    /// Extract release tags, skipping malformed lines, foreign tags, and
    /// tags whose version part is not a valid semantic version.
    pub fn parse(&self, output: &str) -> Vec<RemoteTag> {
        let mut tags: Vec<RemoteTag> = Vec::new();

        for line in output.lines() {
            let Some(caps) = self.line_re.captures(line.trim_end_matches('\r')) else {
                trace!("Skipping ls-remote line: {:?}", line);
                continue;
            };
            let name = &caps[2];
            let Some(version) = name.strip_prefix(&self.tag_prefix) else {
                trace!("Skipping tag without release prefix: {}", name);
                continue;
            };
            if valid(version).is_none() {
                debug!("Discarding tag with invalid version: {}", name);
                continue;
            }
            if tags.iter().any(|t| t.name == name) {
                continue;
            }
            tags.push(RemoteTag {
                name: name.to_string(),
                version: version.to_string(),
            });
        }

        tags
    }
}

/// List release tags of `repository_url`, newest first.
///
/// Fails when the listing itself fails or returns nothing at all.
pub async fn list_tags(
    lister: &dyn TagLister,
    repository_url: &str,
    tag_prefix: &str,
) -> Result<Vec<RemoteTag>, RemoteListError> {
    let output = lister.ls_remote_tags(repository_url).await?;
    if output.trim().is_empty() {
        return Err(RemoteListError::Empty(repository_url.to_string()));
    }

    let mut tags = TagLineParser::new(tag_prefix).parse(&output);
    tags.sort_by(|a, b| match (valid(&a.version), valid(&b.version)) {
        (Some(a), Some(b)) => b.cmp_precedence(&a),
        _ => std::cmp::Ordering::Equal,
    });
    debug!("Listed {} release tags from {}", tags.len(), repository_url);

    Ok(tags)
}

/// Pick the newest tag satisfying `range` from a newest-first list
pub fn resolve_release(tags: &[RemoteTag], range: &VersionRange) -> Option<RemoteTag> {
    let version = find_satisfying(range, tags.iter().map(|t| t.version.as_str()))?;
    tags.iter().find(|t| t.version == version).cloned()
}
