//! Token normalization and direction inference.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

/// Whether a tool fragment is a call, a result, or undecidable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Input,
    Output,
    Unknown,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn camel_boundary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([a-z0-9])([A-Z])").expect("camel boundary regex must compile"))
}

fn disallowed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9_]+").expect("disallowed chars regex must compile"))
}

fn underscore_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"_+").expect("underscore run regex must compile"))
}

/// `camelCase`, `kebab-case`, `dotted.name`, `a/b` and `spaced name` all
/// become lower snake case. Anything outside `[a-z0-9_]` is dropped.
pub fn normalize_token(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let split = camel_boundary_re().replace_all(trimmed, "${1}_${2}");
    let unified: String = split
        .chars()
        .map(|c| match c {
            '-' | ' ' | '.' | '/' => '_',
            other => other,
        })
        .collect::<String>()
        .to_lowercase();
    let cleaned = disallowed_re().replace_all(&unified, "");
    let collapsed = underscore_run_re().replace_all(&cleaned, "_");
    collapsed.trim_matches('_').to_string()
}

/// Normalized tool name; `unknown` when absent or normalizing to nothing.
pub fn normalize_tool_name(name: Option<&str>) -> String {
    match name.map(normalize_token) {
        Some(norm) if !norm.is_empty() => norm,
        _ => "unknown".to_string(),
    }
}

/// Normalized field name; falls back to the lower-cased raw name.
pub fn normalize_field_name(name: &str) -> String {
    let norm = normalize_token(name);
    if norm.is_empty() {
        name.trim().to_lowercase()
    } else {
        norm
    }
}

const OUTPUT_KEYS: &[&str] = &[
    "stdout",
    "stderr",
    "output",
    "result",
    "exitcode",
    "exit_code",
    "exit",
    "exitstatus",
    "is_error",
    "error",
];

const INPUT_KEYS: &[&str] = &[
    "command",
    "commands",
    "args",
    "arguments",
    "input",
    "parameters",
    "query",
    "path",
    "paths",
    "cwd",
    "directory",
];

/// Direction of a parsed payload from its key names.
///
/// Output-like keys win over input-like keys; non-objects are `Unknown`.
pub fn infer_direction(payload: Option<&Value>) -> Direction {
    let Some(Value::Object(obj)) = payload else {
        return Direction::Unknown;
    };
    let keys: Vec<String> = obj.keys().map(|key| normalize_field_name(key)).collect();
    let has_any = |wanted: &[&str]| keys.iter().any(|key| wanted.contains(&key.as_str()));
    if has_any(OUTPUT_KEYS) {
        Direction::Output
    } else if has_any(INPUT_KEYS) {
        Direction::Input
    } else {
        Direction::Unknown
    }
}
