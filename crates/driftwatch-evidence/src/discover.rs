//! Locating evidence on disk: path expansion, glob listing, newest-file pick.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::SystemTime;

use crate::error::EvidenceError;
use crate::jsonl::jsonl_contains_any_type;

fn env_var_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))")
            .expect("env var regex must compile")
    })
}

/// Expand a leading `~` and `$VAR` / `${VAR}` references from the process
/// environment.
///
/// Unset variables are left as written.
pub fn expand_path(raw: &str) -> PathBuf {
    expand_path_with(raw, |name| std::env::var(name).ok())
}

/// [`expand_path`] with an explicit variable lookup. `~` resolves through
/// `lookup("HOME")`.
pub fn expand_path_with(raw: &str, lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    let with_vars = env_var_re().replace_all(raw, |caps: &regex::Captures<'_>| {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        lookup(name).unwrap_or_else(|| caps[0].to_string())
    });

    if let Some(rest) = with_vars.strip_prefix('~')
        && (rest.is_empty() || rest.starts_with('/'))
        && let Some(home) = lookup("HOME").filter(|home| !home.is_empty())
    {
        return PathBuf::from(home).join(rest.trim_start_matches('/'));
    }
    PathBuf::from(with_vars.into_owned())
}

pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
}

/// Files under `root` matching `pattern`.
///
/// A bare `*` pattern with no `/` lists one level; anything else searches
/// the whole subtree.
pub fn list_matches(root: &Path, pattern: &str) -> Result<Vec<PathBuf>, EvidenceError> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }
    let recursive = pattern.contains('/') || !pattern.contains('*');
    let relative = if recursive && !pattern.starts_with("**/") {
        format!("**/{pattern}")
    } else {
        pattern.to_string()
    };
    let escaped_root = glob::Pattern::escape(&root.to_string_lossy());
    let full = format!("{}/{relative}", escaped_root.trim_end_matches('/'));

    let entries = glob::glob(&full).map_err(|e| EvidenceError::Glob {
        pattern: full.clone(),
        message: e.to_string(),
    })?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    Ok(files)
}

fn modified(path: &Path) -> SystemTime {
    path.metadata()
        .and_then(|meta| meta.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

/// Candidates across every root, newest first. Ties keep path order.
pub fn candidates_newest_first(
    roots: &[PathBuf],
    pattern: &str,
) -> Result<Vec<PathBuf>, EvidenceError> {
    let mut all = Vec::new();
    for root in roots {
        all.extend(list_matches(root, pattern)?);
    }
    all.sort();
    all.dedup();
    all.sort_by_key(|path| std::cmp::Reverse(modified(path)));
    Ok(all)
}

/// Most recently modified match across `roots`.
pub fn newest_file(roots: &[PathBuf], pattern: &str) -> Result<Option<PathBuf>, EvidenceError> {
    Ok(candidates_newest_first(roots, pattern)?.into_iter().next())
}

/// Most recent match whose first `max_lines` lines contain one of
/// `required_types`; falls back to the newest match when none qualify.
pub fn newest_file_with_types(
    roots: &[PathBuf],
    pattern: &str,
    required_types: &[String],
    max_lines: usize,
) -> Result<Option<PathBuf>, EvidenceError> {
    let candidates = candidates_newest_first(roots, pattern)?;
    if required_types.is_empty() {
        return Ok(candidates.into_iter().next());
    }
    let qualified = candidates
        .iter()
        .find(|path| jsonl_contains_any_type(path, required_types, max_lines));
    Ok(qualified.or(candidates.first()).cloned())
}

/// The `limit` most recently modified paths, newest first.
pub fn limit_by_mtime(mut paths: Vec<PathBuf>, limit: usize) -> Vec<PathBuf> {
    paths.sort();
    paths.sort_by_key(|path| std::cmp::Reverse(modified(path)));
    paths.truncate(limit);
    paths
}
