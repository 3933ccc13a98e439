//! Minimal `major.minor.patch` extraction and comparison.
//!
//! Version strings come from `--version` output, release tags, and registry
//! payloads, so the first `N.N.N` run anywhere in the text is the version.

use regex::Regex;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Semver {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

fn semver_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\.(\d+)\.(\d+)").expect("semver regex must compile"))
}

impl Semver {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// First `N.N.N` in `text`.
    pub fn find(text: &str) -> Option<Self> {
        let caps = semver_re().captures(text)?;
        let part = |i: usize| caps.get(i)?.as_str().parse::<u64>().ok();
        Some(Self::new(part(1)?, part(2)?, part(3)?))
    }

    /// Every `N.N.N` in `text`, in order of appearance.
    pub fn find_all(text: &str) -> Vec<Self> {
        semver_re()
            .find_iter(text)
            .filter_map(|m| Self::find(m.as_str()))
            .collect()
    }
}

impl std::fmt::Display for Semver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl Serialize for Semver {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Normalized `N.N.N` form of the first version in `text`.
pub fn extract_semver(text: &str) -> Option<String> {
    Semver::find(text).map(|v| v.to_string())
}

/// `a` compared to `b`; `None` if either side is absent or has no version.
pub fn compare_versions(a: Option<&str>, b: Option<&str>) -> Option<Ordering> {
    let a = Semver::find(a?)?;
    let b = Semver::find(b?)?;
    Some(a.cmp(&b))
}

/// True only when both sides parse and `candidate > reference`.
pub fn is_newer(candidate: Option<&str>, reference: Option<&str>) -> bool {
    compare_versions(candidate, reference) == Some(Ordering::Greater)
}
