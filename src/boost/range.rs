//! Semantic version ranges
//!
//! Supports node-semver range specifications, which is what callers of the
//! downloader pass in:
//! - `1.66.0` - exact match
//! - `1.66`, `1` - partial versions, equivalent to `1.66.x` and `1.x`
//! - `^1.66.0` - compatible with version (>=1.66.0 <2.0.0)
//! - `~1.66.0` - approximately equivalent (>=1.66.0 <1.67.0)
//! - `>=1.2.3`, `>1.2.3`, `<=1.2.3`, `<1.2.3` - comparison operators
//! - `1.66.x`, `1.x`, `*` - wildcards
//! - `>=1.65.0 <1.70.0` - AND of ranges (space-separated)
//! - `1.65.1 || 1.66.0` - OR of ranges
//! - `1.65.0 - 1.70.0` - hyphen range (inclusive)
//!
//! Every range is desugared into sets of primitive comparators. Partial
//! operands keep their precision: `>1.65` is `>=1.66.0`, `<=1.70` is
//! `<1.71.0-0`, `~1` is `>=1.0.0 <2.0.0-0`.
//!
//! A prerelease only satisfies a set in which some comparator names a
//! prerelease of the same `major.minor.patch`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use semver::{Prerelease, Version};

use crate::boost::error::ConfigError;
use crate::boost::semver::{Partial, parse_partial};

/// A parsed version range. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct VersionRange {
    raw: String,
    /// Alternatives separated by `||`
    sets: Vec<ComparatorSet>,
}

impl VersionRange {
    /// Parse a range specification. Returns `None` for empty or malformed input.
    pub fn parse(spec: &str) -> Option<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            return None;
        }

        // OR has the lowest precedence
        let sets = spec
            .split("||")
            .map(ComparatorSet::parse)
            .collect::<Option<Vec<_>>>()?;

        Some(Self {
            raw: spec.to_string(),
            sets,
        })
    }

    /// The specification as supplied by the caller
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Check if a version satisfies this range
    pub fn satisfies(&self, version: &Version) -> bool {
        self.sets.iter().any(|set| set.satisfies(version))
    }
}

impl FromStr for VersionRange {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ConfigError::MissingVersion);
        }
        Self::parse(s).ok_or_else(|| ConfigError::InvalidRange(s.to_string()))
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Comparators that must all hold. An empty set matches any release.
#[derive(Debug, Clone)]
struct ComparatorSet(Vec<Comparator>);

impl ComparatorSet {
    fn parse(spec: &str) -> Option<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            return None;
        }

        if let Some((from, to)) = spec.split_once(" - ") {
            return Self::parse_hyphen(from, to);
        }

        let mut comparators = Vec::new();
        for part in split_and_parts(spec) {
            let (operator, operand) = split_operator(&part);
            comparators.extend(desugar(operator, parse_partial(operand)?)?);
        }
        Some(Self(comparators))
    }

    /// `1.65 - 1.70` means `>=1.65.0 <1.71.0-0`; a full upper bound is inclusive
    fn parse_hyphen(from: &str, to: &str) -> Option<Self> {
        let mut comparators = Vec::new();

        match parse_partial(from)? {
            Partial::Any => {}
            from => comparators.push(Comparator::new(Op::Gte, floor(&from))),
        }
        match parse_partial(to)? {
            Partial::Any => {}
            Partial::Full(to) => comparators.push(Comparator::new(Op::Lte, to)),
            to => comparators.push(Comparator::new(Op::Lt, lowest_prerelease(bump(&to)?)?)),
        }

        Some(Self(comparators))
    }

    fn satisfies(&self, version: &Version) -> bool {
        if !self.0.iter().all(|c| c.matches(version)) {
            return false;
        }
        version.pre.is_empty() || self.0.iter().any(|c| c.names_prerelease_of(version))
    }
}

/// Operator as written in a range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Exact,
    Gt,
    Gte,
    Lt,
    Lte,
    Tilde,
    Caret,
}

/// Longer symbols first so `>=` is not read as `>`
const OPERATORS: &[(&str, Operator)] = &[
    (">=", Operator::Gte),
    ("<=", Operator::Lte),
    ("~>", Operator::Tilde),
    (">", Operator::Gt),
    ("<", Operator::Lt),
    ("=", Operator::Exact),
    ("~", Operator::Tilde),
    ("^", Operator::Caret),
];

fn split_operator(part: &str) -> (Operator, &str) {
    for (symbol, operator) in OPERATORS {
        if let Some(operand) = part.strip_prefix(symbol) {
            return (*operator, operand.trim());
        }
    }
    (Operator::Exact, part)
}

/// Split on whitespace, re-attaching bare operators (`>= 1.2`) to their operand
fn split_and_parts(spec: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut pending_operator = String::new();

    for token in spec.split_whitespace() {
        if token.chars().all(|c| matches!(c, '<' | '>' | '=' | '^' | '~')) {
            pending_operator.push_str(token);
            continue;
        }
        parts.push(format!("{}{}", pending_operator, token));
        pending_operator.clear();
    }

    if !pending_operator.is_empty() {
        parts.push(pending_operator);
    }

    parts
}

/// Primitive comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

#[derive(Debug, Clone)]
struct Comparator {
    op: Op,
    version: Version,
}

impl Comparator {
    fn new(op: Op, version: Version) -> Self {
        Self { op, version }
    }

    /// Build metadata is ignored, as node-semver does
    fn matches(&self, version: &Version) -> bool {
        let ordering = version.cmp_precedence(&self.version);
        match self.op {
            Op::Eq => ordering == Ordering::Equal,
            Op::Gt => ordering == Ordering::Greater,
            Op::Gte => ordering != Ordering::Less,
            Op::Lt => ordering == Ordering::Less,
            Op::Lte => ordering != Ordering::Greater,
        }
    }

    fn names_prerelease_of(&self, version: &Version) -> bool {
        !self.version.pre.is_empty()
            && (self.version.major, self.version.minor, self.version.patch)
                == (version.major, version.minor, version.patch)
    }
}

/// Expand one `operator operand` pair into primitive comparators
fn desugar(operator: Operator, operand: Partial) -> Option<Vec<Comparator>> {
    let comparators = match (operator, operand) {
        // `>*` and `<*` match nothing
        (Operator::Gt | Operator::Lt, Partial::Any) => vec![Comparator::new(
            Op::Lt,
            lowest_prerelease(Version::new(0, 0, 0))?,
        )],
        (_, Partial::Any) => Vec::new(),

        (Operator::Exact, Partial::Full(v)) => vec![Comparator::new(Op::Eq, v)],
        (Operator::Exact, partial) => x_range(&partial)?,

        (Operator::Tilde, Partial::Full(v)) => {
            let upper = Version::new(v.major, v.minor.checked_add(1)?, 0);
            vec![
                Comparator::new(Op::Gte, v),
                Comparator::new(Op::Lt, lowest_prerelease(upper)?),
            ]
        }
        (Operator::Tilde, partial) => x_range(&partial)?,

        (Operator::Gt, Partial::Full(v)) => vec![Comparator::new(Op::Gt, v)],
        (Operator::Gt, partial) => vec![Comparator::new(Op::Gte, bump(&partial)?)],

        (Operator::Gte, partial) => vec![Comparator::new(Op::Gte, floor(&partial))],

        (Operator::Lt, Partial::Full(v)) => vec![Comparator::new(Op::Lt, v)],
        (Operator::Lt, partial) => vec![Comparator::new(
            Op::Lt,
            lowest_prerelease(floor(&partial))?,
        )],

        (Operator::Lte, Partial::Full(v)) => vec![Comparator::new(Op::Lte, v)],
        (Operator::Lte, partial) => vec![Comparator::new(
            Op::Lt,
            lowest_prerelease(bump(&partial)?)?,
        )],

        (Operator::Caret, partial) => caret(&partial)?,
    };

    Some(comparators)
}

/// `1` -> `>=1.0.0 <2.0.0-0`, `1.2` -> `>=1.2.0 <1.3.0-0`
fn x_range(partial: &Partial) -> Option<Vec<Comparator>> {
    Some(vec![
        Comparator::new(Op::Gte, floor(partial)),
        Comparator::new(Op::Lt, lowest_prerelease(bump(partial)?)?),
    ])
}

/// Allow changes that keep the left-most non-zero component
///
/// ^1.2.3 -> <2.0.0-0, ^0.2.3 -> <0.3.0-0, ^0.0.3 -> <0.0.4-0,
/// ^1.x -> <2.0.0-0, ^0.x -> <1.0.0-0, ^0.0 -> <0.1.0-0
fn caret(partial: &Partial) -> Option<Vec<Comparator>> {
    let upper = match partial {
        Partial::Any => return Some(Vec::new()),
        Partial::Major(major) => Version::new(major.checked_add(1)?, 0, 0),
        Partial::Minor(0, minor) => Version::new(0, minor.checked_add(1)?, 0),
        Partial::Minor(major, _) => Version::new(major.checked_add(1)?, 0, 0),
        Partial::Full(v) if v.major > 0 => Version::new(v.major.checked_add(1)?, 0, 0),
        Partial::Full(v) if v.minor > 0 => Version::new(0, v.minor.checked_add(1)?, 0),
        Partial::Full(v) => Version::new(0, 0, v.patch.checked_add(1)?),
    };

    Some(vec![
        Comparator::new(Op::Gte, floor(partial)),
        Comparator::new(Op::Lt, lowest_prerelease(upper)?),
    ])
}

/// Lowest release named by a partial: `1.2` -> 1.2.0
fn floor(partial: &Partial) -> Version {
    match partial {
        Partial::Any => Version::new(0, 0, 0),
        Partial::Major(major) => Version::new(*major, 0, 0),
        Partial::Minor(major, minor) => Version::new(*major, *minor, 0),
        Partial::Full(v) => v.clone(),
    }
}

/// First release past a partial: `1.2` -> 1.3.0, `1` -> 2.0.0
fn bump(partial: &Partial) -> Option<Version> {
    match partial {
        Partial::Major(major) => Some(Version::new(major.checked_add(1)?, 0, 0)),
        Partial::Minor(major, minor) => Some(Version::new(*major, minor.checked_add(1)?, 0)),
        Partial::Any | Partial::Full(_) => None,
    }
}

/// `version-0`, below every prerelease of `version`
fn lowest_prerelease(version: Version) -> Option<Version> {
    let pre = Prerelease::new("0").ok()?;
    Some(Version { pre, ..version })
}
