//! Report shapes and the sink that persists them.

use driftwatch_catalog::Catalog;
use driftwatch_evidence::{ExtractionWarning, LocalFingerprint, ScanKind};
use driftwatch_kernel::{
    DecisionRule, EvaluationMode, ProducerFamily, Recommendation, SchemaDiff, Severity, TypeKeys,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::WatchError;
use crate::keywords::KeywordHits;
use crate::probe::{InstalledVersion, ProbeResult};
use crate::upstream::UpstreamResolution;

/// Directory name for one run, e.g. `20260102-030405Z`.
pub const RUN_SLUG_FORMAT: &str = "%Y%m%d-%H%M%SZ";

pub const REPORT_FILE: &str = "report.json";
pub const CATALOG_JSON_FILE: &str = "tool_io_catalog.json";
pub const CATALOG_MARKDOWN_FILE: &str = "tool_io_report.md";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VersionDiff {
    pub upstream_newer_than_verified: bool,
    pub installed_newer_than_verified: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Risk {
    #[serde(flatten)]
    pub keywords: KeywordHits,
    pub monitoring_failed: bool,
}

/// What the newest local session looked like, or why there was none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum LocalSchemaReport {
    Extracted(LocalFingerprint),
    NotFound {
        error: ExtractionWarning,
        roots: Vec<String>,
        glob: String,
        kind: ScanKind,
    },
    ScanFailed {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BaselineReport {
    pub fixtures: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
    pub digest: String,
    pub type_keys: TypeKeys,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeeklyDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_schema: Option<LocalSchemaReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_schema: Option<BaselineReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_diff: Option<SchemaDiff>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub probes: Vec<ProbeResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvidenceSummary {
    /// `None` when no comparison ran.
    pub schema_matches_baseline: Option<bool>,
    pub schema_diff: Option<SchemaDiff>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentReport {
    pub verified_version: Option<String>,
    pub installed: InstalledVersion,
    pub upstream: UpstreamResolution,
    pub diff: VersionDiff,
    pub risk: Risk,
    pub weekly: Option<WeeklyDetails>,
    pub evidence: EvidenceSummary,
    pub severity: Severity,
    pub recommendation: Recommendation,
    pub rule: DecisionRule,
    pub actionable: bool,
}

impl AgentReport {
    pub fn summary_line(&self, family: ProducerFamily) -> String {
        let or_unknown = |value: Option<&str>| value.unwrap_or("unknown").to_string();
        format!(
            "{family}: severity={} verified={} installed={} upstream={} rec={}",
            self.severity,
            or_unknown(self.verified_version.as_deref()),
            or_unknown(self.installed.parsed_version.as_deref()),
            or_unknown(self.upstream.parsed_version.as_deref()),
            self.recommendation
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatchReport {
    pub timestamp_utc: String,
    pub mode: EvaluationMode,
    pub config: String,
    pub report_dir: String,
    pub results: BTreeMap<ProducerFamily, AgentReport>,
    /// One line per producer whose severity is above `none`.
    pub summary_lines: Vec<String>,
    pub any_actionable: bool,
}

/// Persists finished, immutable reports and catalogs.
pub trait ReportSink {
    fn write_report(&self, report: &WatchReport) -> Result<PathBuf, WatchError>;

    /// Returns the JSON and markdown paths written.
    fn write_catalog(
        &self,
        catalog: &Catalog,
        markdown: &str,
    ) -> Result<(PathBuf, PathBuf), WatchError>;
}

/// Writes into a directory with tmp-file-then-rename, so readers never see
/// a half-written file.
#[derive(Debug, Clone)]
pub struct FsReportSink {
    report_path: PathBuf,
    catalog_json_path: PathBuf,
    catalog_markdown_path: PathBuf,
}

impl FsReportSink {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            report_path: dir.join(REPORT_FILE),
            catalog_json_path: dir.join(CATALOG_JSON_FILE),
            catalog_markdown_path: dir.join(CATALOG_MARKDOWN_FILE),
        }
    }

    pub fn with_catalog_paths(mut self, json: PathBuf, markdown: PathBuf) -> Self {
        self.catalog_json_path = json;
        self.catalog_markdown_path = markdown;
        self
    }
}

impl ReportSink for FsReportSink {
    fn write_report(&self, report: &WatchReport) -> Result<PathBuf, WatchError> {
        write_json_atomic(&self.report_path, report)?;
        Ok(self.report_path.clone())
    }

    fn write_catalog(
        &self,
        catalog: &Catalog,
        markdown: &str,
    ) -> Result<(PathBuf, PathBuf), WatchError> {
        write_json_atomic(&self.catalog_json_path, catalog)?;
        write_atomic(&self.catalog_markdown_path, markdown.as_bytes())?;
        Ok((
            self.catalog_json_path.clone(),
            self.catalog_markdown_path.clone(),
        ))
    }
}

/// `<root>/<UTC timestamp>` for a run starting now.
pub fn run_dir(root: &Path, now: chrono::DateTime<chrono::Utc>) -> PathBuf {
    root.join(now.format(RUN_SLUG_FORMAT).to_string())
}

pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), WatchError> {
    replace_file(path, |out| {
        serde_json::to_writer_pretty(&mut *out, value)?;
        out.write_all(b"\n")
    })
}

pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), WatchError> {
    replace_file(path, |out| out.write_all(bytes))
}

/// Streams `fill` into a hidden sibling of `path`, then renames it into
/// place. On any failure the sibling is removed and `path` is untouched.
fn replace_file<F>(path: &Path, fill: F) -> Result<(), WatchError>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| WatchError::sink(parent, e))?;
    }

    let staging = staging_path(path);
    File::create(&staging)
        .and_then(|file| {
            let mut out = BufWriter::new(file);
            fill(&mut out)?;
            out.into_inner()
                .map_err(io::IntoInnerError::into_error)?
                .sync_all()
        })
        .and_then(|()| fs::rename(&staging, path))
        .map_err(|e| {
            let _ = fs::remove_file(&staging);
            WatchError::sink(path, e)
        })
}

/// `.<name>.<pid>-<nanos>.partial` next to `path`.
fn staging_path(path: &Path) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}-{nanos}.partial", std::process::id()))
}
