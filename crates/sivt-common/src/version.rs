//! Semantic comparison of TKG and package version strings.
//!
//! Version strings in spec and state files are written loosely ("1.4.0",
//! "v1.3.1", "1.4", "1.5.1+vmware.1-tkg.1"). They are normalized to three
//! numeric components before comparison so "1.10.0" sorts after "1.9.0".

use std::cmp::Ordering;

use semver::Version;

use crate::{Error, Result};

/// TKG release that switched extensions to the package flow
pub const PACKAGE_FLOW_MIN_VERSION: &str = "1.4.0";

/// Parse a loosely written version. Returns `None` when it isn't a version.
pub fn parse(raw: &str) -> Option<Version> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(v) = Version::parse(trimmed) {
        return Some(v);
    }

    // pad "1.4" / "1" out to three components, keeping any suffix
    let split_at = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, suffix) = trimmed.split_at(split_at);
    let mut parts: Vec<&str> = core.split('.').collect();
    if parts.len() >= 3 || parts.iter().any(|p| p.parse::<u64>().is_err()) {
        return None;
    }
    while parts.len() < 3 {
        parts.push("0");
    }
    Version::parse(&format!("{}{}", parts.join("."), suffix)).ok()
}

/// Compare two versions, `None` if either side doesn't parse
pub fn compare(a: &str, b: &str) -> Option<Ordering> {
    Some(parse(a)?.cmp(&parse(b)?))
}

/// True when moving from `current` to `desired` goes backwards.
///
/// Unparseable input is not reported as a downgrade; callers validate
/// membership in the support matrix separately.
pub fn is_downgrade(current: &str, desired: &str) -> bool {
    compare(desired, current) == Some(Ordering::Less)
}

/// True when `version` sorts strictly before `threshold`
pub fn is_below(version: &str, threshold: &str) -> Result<bool> {
    compare(version, threshold)
        .map(|ord| ord == Ordering::Less)
        .ok_or_else(|| {
            Error::configuration(format!(
                "cannot compare version '{version}' with '{threshold}'"
            ))
        })
}

/// Highest parseable version in `versions`
pub fn highest<S: AsRef<str>>(versions: &[S]) -> Option<&str> {
    versions
        .iter()
        .map(AsRef::as_ref)
        .filter_map(|v| parse(v).map(|parsed| (parsed, v)))
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, raw)| raw)
}
