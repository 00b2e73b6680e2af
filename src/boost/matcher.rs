//! Matching version ranges against candidate version strings
//!
//! Candidates come from cache directory names and remote tag names. Anything
//! that is not a valid semantic version is skipped, never an error.

use semver::Version;

use crate::boost::range::VersionRange;
use crate::boost::semver::valid;

/// Return the first candidate, in the given order, that satisfies `range`.
///
/// Returns `None` when there are no candidates or none satisfy; the caller
/// decides what that means.
pub fn find_satisfying<I, S>(range: &VersionRange, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    candidates.into_iter().find_map(|candidate| {
        let candidate = candidate.as_ref();
        valid(candidate)
            .filter(|version| range.satisfies(version))
            .map(|_| candidate.to_string())
    })
}

/// Order candidates newest first, dropping invalid ones.
///
/// Scanning the result with [`find_satisfying`] yields the newest satisfying
/// version.
pub fn sort_newest_first<I, S>(candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut parsed: Vec<(Version, String)> = candidates
        .into_iter()
        .filter_map(|c| valid(c.as_ref()).map(|v| (v, c.as_ref().to_string())))
        .collect();
    parsed.sort_by(|(a, _), (b, _)| b.cmp_precedence(a));
    parsed.into_iter().map(|(_, original)| original).collect()
}
