//! Finding producer logs and feeding them through the extractors.

use driftwatch_evidence::{limit_by_mtime, list_matches};
use driftwatch_kernel::ProducerFamily;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Component, Path, PathBuf};

use crate::braces::extract_raw_items;
use crate::catalog::{Catalog, CatalogBuilder, CatalogLimits, Example, ToolBlock};
use crate::error::CatalogError;
use crate::fragment::{ParsedPayload, ToolFragment, is_truthy};
use crate::normalize::infer_direction;
use crate::producers::structured_extractor;
use crate::text::{extract_text_tool_blocks, text_candidates};

/// Where producers keep their logs on this machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryRoots {
    pub home: PathBuf,
    /// Overrides `~/.codex`.
    pub codex_home: Option<PathBuf>,
}

impl DiscoveryRoots {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            codex_home: None,
        }
    }

    /// `$HOME`, honoring `$CODEX_HOME`.
    pub fn from_env() -> Option<Self> {
        let home = driftwatch_evidence::home_dir()?;
        let codex_home = std::env::var_os("CODEX_HOME")
            .filter(|value| !value.is_empty())
            .map(|value| driftwatch_evidence::expand_path(&value.to_string_lossy()));
        Some(Self { home, codex_home })
    }
}

/// What to scan and how much of it.
#[derive(Debug, Clone)]
pub struct CatalogRequest {
    /// `None` skips live session discovery.
    pub discovery: Option<DiscoveryRoots>,
    pub fixtures_root: Option<PathBuf>,
    pub limits: CatalogLimits,
}

fn is_jsonl(path: &Path) -> bool {
    matches!(extension(path).as_deref(), Some("jsonl" | "ndjson"))
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
}

fn is_hex_project_dir(name: &str) -> bool {
    (32..=64).contains(&name.len()) && name.chars().all(|c| c.is_ascii_hexdigit())
}

/// Whether a JSONL file under `~/.factory/projects` is a Droid stream-json
/// session: at least three recognized event types in the first 50 lines,
/// a session id, and a primary message or tool call.
pub fn droid_looks_like_stream_json(path: &Path) -> bool {
    let Ok(file) = File::open(path) else {
        return false;
    };
    let mut recognized = 0;
    let mut saw_session = false;
    let mut saw_primary = false;
    for line in BufReader::new(file).lines().take(50).map_while(Result::ok) {
        let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(line.trim()) else {
            continue;
        };
        let kind = obj
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_lowercase();
        if matches!(
            kind.as_str(),
            "system" | "message" | "tool_call" | "tool_result" | "completion"
        ) {
            recognized += 1;
        }
        let present = |key: &str| obj.get(key).is_some_and(is_truthy);
        if present("session_id") || present("sessionId") {
            saw_session = true;
        }
        if (kind == "message" && present("role") && present("text"))
            || (kind == "tool_call" && present("toolName"))
        {
            saw_primary = true;
        }
    }
    recognized >= 3 && saw_session && saw_primary
}

/// Session files for `family` under the default per-producer locations.
pub fn discover_family(
    family: ProducerFamily,
    roots: &DiscoveryRoots,
) -> Result<Vec<PathBuf>, CatalogError> {
    let home = &roots.home;
    let files = match family {
        ProducerFamily::Codex => {
            let base = roots
                .codex_home
                .clone()
                .unwrap_or_else(|| home.join(".codex"));
            list_matches(&base.join("sessions"), "**/rollout-*.jsonl")?
        }
        ProducerFamily::Claude => {
            let base = home.join(".claude");
            let projects = base.join("projects");
            let scan_root = if projects.is_dir() { projects } else { base };
            let mut files = list_matches(&scan_root, "**/*.jsonl")?;
            files.extend(list_matches(&scan_root, "**/*.ndjson")?);
            files
        }
        ProducerFamily::Copilot => list_matches(&home.join(".copilot/session-state"), "*.jsonl")?,
        ProducerFamily::Droid => {
            let mut files = list_matches(&home.join(".factory/sessions"), "**/*.jsonl")?;
            files.extend(
                list_matches(&home.join(".factory/projects"), "**/*.jsonl")?
                    .into_iter()
                    .filter(|path| droid_looks_like_stream_json(path)),
            );
            files
        }
        ProducerFamily::Gemini => {
            let tmp = home.join(".gemini/tmp");
            let mut files = Vec::new();
            let projects = std::fs::read_dir(&tmp)
                .map(|entries| {
                    entries
                        .filter_map(Result::ok)
                        .map(|entry| entry.path())
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            for project in projects {
                let is_project = project.is_dir()
                    && project
                        .file_name()
                        .and_then(|name| name.to_str())
                        .is_some_and(is_hex_project_dir);
                if !is_project {
                    continue;
                }
                files.extend(list_matches(&project.join("chats"), "session-*.json")?);
                files.extend(list_matches(&project, "session-*.json")?);
            }
            files
        }
        ProducerFamily::Opencode => list_matches(
            &home.join(".local/share/opencode/storage/session"),
            "**/ses_*.json",
        )?,
    };
    Ok(files)
}

/// Family of a fixture file: the segment after `agents/`, else a family
/// name inside the file name, else codex.
pub fn infer_fixture_family(path: &Path) -> ProducerFamily {
    let segments: Vec<&str> = path
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect();
    let from_agents_dir = segments
        .windows(2)
        .filter(|pair| pair[0] == "agents")
        .find_map(|pair| pair[1].parse::<ProducerFamily>().ok());
    if let Some(family) = from_agents_dir {
        return family;
    }
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_lowercase();
    ProducerFamily::ALL
        .into_iter()
        .find(|family| file_name.contains(family.as_str()))
        .unwrap_or(ProducerFamily::Codex)
}

/// Every `.jsonl`, `.ndjson` and `.json` file under `root`, by family.
pub fn discover_fixture_files(
    root: &Path,
) -> Result<BTreeMap<ProducerFamily, Vec<PathBuf>>, CatalogError> {
    let mut out: BTreeMap<ProducerFamily, Vec<PathBuf>> = BTreeMap::new();
    for path in list_matches(root, "**/*")? {
        if is_jsonl(&path) || extension(&path).as_deref() == Some("json") {
            out.entry(infer_fixture_family(&path)).or_default().push(path);
        }
    }
    Ok(out)
}

/// Part files in the `part/` directory beside each session's storage root
/// (`<storage>/session/<project>/ses_*.json`).
pub fn opencode_part_files(sessions: &[PathBuf]) -> Result<Vec<PathBuf>, CatalogError> {
    let mut part_roots = BTreeSet::new();
    for session in sessions {
        if let Some(storage) = session.parent().and_then(Path::parent).and_then(Path::parent) {
            part_roots.insert(storage.join("part"));
        }
    }
    let mut parts = BTreeSet::new();
    for root in part_roots {
        parts.extend(list_matches(&root, "**/*.json")?);
    }
    Ok(parts.into_iter().collect())
}

struct Source<'a> {
    family: ProducerFamily,
    path: &'a Path,
    index: Option<usize>,
}

fn add_structured(
    builder: &mut CatalogBuilder,
    source: &Source<'_>,
    raw_event: &str,
    fragments: Vec<ToolFragment>,
) {
    for fragment in fragments {
        let payload = ParsedPayload::from_value(fragment.payload.as_ref());
        let fields = if fragment.fields.is_empty() {
            payload.fields.clone()
        } else {
            fragment.fields
        };
        builder.add(ToolBlock {
            family: source.family,
            tool_name: fragment.tool_name.clone(),
            direction: fragment.direction,
            shape_signature: fragment.shape.to_string(),
            fields,
            example: Example {
                family: source.family,
                source_file: source.path.display().to_string(),
                event_index: source.index,
                direction: fragment.direction,
                tool_name: fragment.tool_name,
                shape_signature: fragment.shape.to_string(),
                field_path: Some(fragment.field_path.to_string()),
                raw_event: raw_event.to_string(),
                raw_payload: payload.raw,
                parsed_payload: payload.parsed,
                parse_error: payload.error,
            },
        });
    }
}

fn add_text_blocks(builder: &mut CatalogBuilder, source: &Source<'_>, obj: &Map<String, Value>) {
    let max_text_len = builder.limits().max_text_len;
    for (field_path, text) in text_candidates(obj) {
        if text.chars().count() > max_text_len {
            continue;
        }
        for block in extract_text_tool_blocks(text) {
            let payload = ParsedPayload::from_text(block.raw_json);
            let direction = infer_direction(payload.parsed.as_ref());
            builder.add(ToolBlock {
                family: source.family,
                tool_name: Some(block.tool_name.to_string()),
                direction,
                shape_signature: block.shape.to_string(),
                fields: payload.fields.clone(),
                example: Example {
                    family: source.family,
                    source_file: source.path.display().to_string(),
                    event_index: source.index,
                    direction,
                    tool_name: Some(block.tool_name.to_string()),
                    shape_signature: block.shape.to_string(),
                    field_path: Some(field_path.clone()),
                    raw_event: text.to_string(),
                    raw_payload: payload.raw,
                    parsed_payload: payload.parsed,
                    parse_error: payload.error,
                },
            });
        }
    }
}

fn scan_object(
    builder: &mut CatalogBuilder,
    source: &Source<'_>,
    raw_event: &str,
    obj: &Map<String, Value>,
    with_text: bool,
) {
    let fragments = structured_extractor(source.family)(obj);
    add_structured(builder, source, raw_event, fragments);
    if with_text {
        add_text_blocks(builder, source, obj);
    }
}

/// One object per line. Lines that are not JSON objects are skipped.
pub fn scan_jsonl_file(builder: &mut CatalogBuilder, family: ProducerFamily, path: &Path) {
    let Ok(bytes) = std::fs::read(path) else {
        tracing::warn!(path = %path.display(), "cannot read catalog source");
        return;
    };
    let text = String::from_utf8_lossy(&bytes);
    for (index, line) in text.lines().enumerate() {
        let raw = line.trim_end_matches('\r');
        if raw.trim().is_empty() {
            continue;
        }
        let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(raw) else {
            continue;
        };
        let source = Source {
            family,
            path,
            index: Some(index),
        };
        scan_object(builder, &source, raw, &obj, true);
    }
}

/// A session document cut into raw items, each parsed on its own so one
/// broken item does not lose the rest.
pub fn scan_json_document(builder: &mut CatalogBuilder, family: ProducerFamily, path: &Path) {
    let Ok(bytes) = std::fs::read(path) else {
        tracing::warn!(path = %path.display(), "cannot read catalog source");
        return;
    };
    let text = String::from_utf8_lossy(&bytes);
    for (index, raw) in extract_raw_items(&text).into_iter().enumerate() {
        let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(raw) else {
            continue;
        };
        let source = Source {
            family,
            path,
            index: Some(index),
        };
        scan_object(builder, &source, raw, &obj, true);
    }
}

/// A single-object file, such as an OpenCode part.
pub fn scan_single_object(builder: &mut CatalogBuilder, family: ProducerFamily, path: &Path) {
    let Ok(bytes) = std::fs::read(path) else {
        tracing::warn!(path = %path.display(), "cannot read catalog source");
        return;
    };
    let text = String::from_utf8_lossy(&bytes);
    let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(&text) else {
        return;
    };
    let source = Source {
        family,
        path,
        index: None,
    };
    scan_object(builder, &source, &text, &obj, false);
}

fn scan_path(builder: &mut CatalogBuilder, family: ProducerFamily, path: &Path) {
    if is_jsonl(path) {
        scan_jsonl_file(builder, family, path);
    } else if family == ProducerFamily::Opencode {
        scan_single_object(builder, family, path);
    } else {
        scan_json_document(builder, family, path);
    }
    builder.note_file_scanned(family);
}

fn note_parents(builder: &mut CatalogBuilder, family: ProducerFamily, paths: &[PathBuf]) {
    for path in paths {
        if let Some(parent) = path.parent() {
            builder.note_root(family, parent.display().to_string());
        }
    }
}

fn newest_then_sorted(paths: Vec<PathBuf>, limit: usize) -> Vec<PathBuf> {
    let mut kept = if limit == 0 {
        paths
    } else {
        limit_by_mtime(paths, limit)
    };
    kept.sort();
    kept.dedup();
    kept
}

/// Scan one family's files. OpenCode sessions also pull in their part files.
pub fn scan_family(
    family: ProducerFamily,
    paths: Vec<PathBuf>,
    limits: CatalogLimits,
) -> CatalogBuilder {
    let mut builder = CatalogBuilder::new(limits);
    let paths = newest_then_sorted(paths, limits.max_files_per_family);
    note_parents(&mut builder, family, &paths);
    for path in &paths {
        scan_path(&mut builder, family, path);
    }

    if family == ProducerFamily::Opencode {
        let parts = match opencode_part_files(&paths) {
            Ok(parts) => newest_then_sorted(parts, limits.max_files_per_family),
            Err(error) => {
                tracing::warn!(%error, "cannot list opencode part files");
                Vec::new()
            }
        };
        note_parents(&mut builder, family, &parts);
        for part in &parts {
            scan_single_object(&mut builder, family, part);
            builder.note_file_scanned(family);
        }
    }
    tracing::debug!(%family, files = paths.len(), "catalog family scanned");
    builder
}

/// Live sessions plus fixtures, by family.
pub fn collect_sources(
    request: &CatalogRequest,
) -> Result<BTreeMap<ProducerFamily, Vec<PathBuf>>, CatalogError> {
    let mut sources: BTreeMap<ProducerFamily, Vec<PathBuf>> = BTreeMap::new();
    if let Some(roots) = &request.discovery {
        for family in ProducerFamily::ALL {
            sources.insert(family, discover_family(family, roots)?);
        }
    }
    if let Some(fixtures_root) = &request.fixtures_root {
        for (family, paths) in discover_fixture_files(fixtures_root)? {
            sources.entry(family).or_default().extend(paths);
        }
    }
    Ok(sources)
}

/// Scan every family on its own thread and merge in family order.
pub fn scan_sources(
    sources: BTreeMap<ProducerFamily, Vec<PathBuf>>,
    limits: CatalogLimits,
) -> CatalogBuilder {
    let mut merged = CatalogBuilder::new(limits);
    std::thread::scope(|scope| {
        let handles: Vec<_> = sources
            .into_iter()
            .map(|(family, paths)| (family, scope.spawn(move || scan_family(family, paths, limits))))
            .collect();
        for (family, handle) in handles {
            match handle.join() {
                Ok(builder) => merged.merge(builder),
                Err(_) => tracing::error!(%family, "catalog scan thread panicked"),
            }
        }
    });
    merged
}

pub fn build_catalog(request: &CatalogRequest) -> Result<Catalog, CatalogError> {
    let sources = collect_sources(request)?;
    let builder = scan_sources(sources, request.limits);
    let generated_at = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
    Ok(builder.finish(generated_at))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_family_from_agents_segment_then_file_name() {
        assert_eq!(
            infer_fixture_family(Path::new("Fixtures/stage0/agents/gemini/chat.jsonl")),
            ProducerFamily::Gemini
        );
        assert_eq!(
            infer_fixture_family(Path::new("Fixtures/copilot_session.jsonl")),
            ProducerFamily::Copilot
        );
        assert_eq!(
            infer_fixture_family(Path::new("Fixtures/session.jsonl")),
            ProducerFamily::Codex
        );
    }

    #[test]
    fn hex_project_names_only() {
        assert!(is_hex_project_dir(&"ab12".repeat(8)));
        assert!(!is_hex_project_dir("short"));
        assert!(!is_hex_project_dir(&"zz".repeat(20)));
    }
}
