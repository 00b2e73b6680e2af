use semver::Version;

/// Validate a candidate version string, returning the parsed version.
///
/// Accepts the loose forms release tooling commonly emits: surrounding
/// whitespace and a single leading `v` or `=` are tolerated.
///
/// Examples:
/// - "1.66.0" -> Version(1, 66, 0)
/// - "v1.70.0" -> Version(1, 70, 0)
/// - "1.66" -> None (candidates must be complete)
/// - "notaversion" -> None
pub fn valid(candidate: &str) -> Option<Version> {
    let trimmed = candidate.trim();
    let stripped = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('='))
        .unwrap_or(trimmed);
    Version::parse(stripped.trim()).ok()
}

/// A range operand that may leave trailing components unspecified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Partial {
    /// `*`, `x`, `X`
    Any,
    /// `1`, `1.x`
    Major(u64),
    /// `1.2`, `1.2.x`
    Minor(u64, u64),
    Full(Version),
}

/// Parse a range operand, keeping how many components it names.
///
/// Examples:
/// - "1.66.0" -> Full(1.66.0)
/// - "1.66", "1.66.x" -> Minor(1, 66)
/// - "v1" -> Major(1)
/// - "*" -> Any
/// - "1.x.3", "1.2.3.4" -> None
pub fn parse_partial(operand: &str) -> Option<Partial> {
    let operand = operand.trim();
    let operand = operand.strip_prefix('v').unwrap_or(operand);
    if let Ok(version) = Version::parse(operand) {
        return Some(Partial::Full(version));
    }

    let parts: Vec<&str> = operand.split('.').collect();
    if parts.len() > 3 {
        return None;
    }

    let is_wild = |s: &str| s == "*" || s.eq_ignore_ascii_case("x");
    let mut numbers = Vec::with_capacity(parts.len());
    let mut wildcard = false;
    for part in parts {
        if is_wild(part) {
            wildcard = true;
        } else if wildcard {
            return None;
        } else {
            numbers.push(part.parse::<u64>().ok()?);
        }
    }

    match numbers.as_slice() {
        [] => Some(Partial::Any),
        [major] => Some(Partial::Major(*major)),
        [major, minor] => Some(Partial::Minor(*major, *minor)),
        [major, minor, patch] => Some(Partial::Full(Version::new(*major, *minor, *patch))),
        _ => None,
    }
}
