//! Per-family extraction dispatch.
//!
//! Each producer family stores sessions in one of three layouts. The
//! capability table maps a family to its layout; [`scan_local`] picks the
//! newest session under configured roots and runs the matching extractor.

use driftwatch_kernel::{Fingerprint, FingerprintBuilder, ProducerFamily, Record};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::discover::{expand_path, newest_file, newest_file_with_types};
use crate::error::{EvidenceError, ExtractionWarning};
use crate::jsonl::extract_jsonl;
use crate::session_json::extract_session_json;
use crate::storage_tree::extract_storage_tree;

/// Lines inspected when checking a candidate for required record types.
pub const REQUIRED_TYPE_PROBE_LINES: usize = 400;

/// On-disk session layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreLayout {
    /// One JSON object per line.
    JsonlStream,
    /// One JSON document with a `messages` array.
    SessionDocument,
    /// Session, message and part records in separate linked files.
    LinkedTree,
}

impl StoreLayout {
    /// Extension a fixture file must carry to count toward a baseline.
    pub fn fixture_extension(self) -> &'static str {
        match self {
            Self::JsonlStream => "jsonl",
            Self::SessionDocument | Self::LinkedTree => "json",
        }
    }

    pub fn default_scan_kind(self) -> ScanKind {
        match self {
            Self::JsonlStream => ScanKind::JsonlNewest,
            Self::SessionDocument => ScanKind::SessionJsonNewest,
            Self::LinkedTree => ScanKind::StorageTreeLatestSession,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FamilyCapabilities {
    pub family: ProducerFamily,
    pub layout: StoreLayout,
}

const CAPABILITIES: [FamilyCapabilities; 6] = [
    FamilyCapabilities {
        family: ProducerFamily::Codex,
        layout: StoreLayout::JsonlStream,
    },
    FamilyCapabilities {
        family: ProducerFamily::Claude,
        layout: StoreLayout::JsonlStream,
    },
    FamilyCapabilities {
        family: ProducerFamily::Copilot,
        layout: StoreLayout::JsonlStream,
    },
    FamilyCapabilities {
        family: ProducerFamily::Droid,
        layout: StoreLayout::JsonlStream,
    },
    FamilyCapabilities {
        family: ProducerFamily::Gemini,
        layout: StoreLayout::SessionDocument,
    },
    FamilyCapabilities {
        family: ProducerFamily::Opencode,
        layout: StoreLayout::LinkedTree,
    },
];

pub fn capabilities(family: ProducerFamily) -> FamilyCapabilities {
    CAPABILITIES
        .iter()
        .copied()
        .find(|caps| caps.family == family)
        .unwrap_or(FamilyCapabilities {
            family,
            layout: StoreLayout::JsonlStream,
        })
}

/// Records pulled from one source, plus what went wrong along the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub family: ProducerFamily,
    pub source: PathBuf,
    pub records: Vec<Record>,
    pub parse_errors: u64,
    pub message_files_parsed: u64,
    pub part_files_parsed: u64,
    pub warning: Option<ExtractionWarning>,
}

impl Extraction {
    pub fn new(family: ProducerFamily, source: impl Into<PathBuf>) -> Self {
        Self {
            family,
            source: source.into(),
            records: Vec::new(),
            parse_errors: 0,
            message_files_parsed: 0,
            part_files_parsed: 0,
            warning: None,
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        let mut builder = FingerprintBuilder::default();
        for record in &self.records {
            builder.push(record);
        }
        builder.add_parse_errors(self.parse_errors);
        builder.finish()
    }

    pub fn summary(&self) -> LocalFingerprint {
        let layout = capabilities(self.family).layout;
        let tree = layout == StoreLayout::LinkedTree;
        let fingerprint = self.fingerprint();
        LocalFingerprint {
            file: self.source.display().to_string(),
            digest: fingerprint.digest(),
            fingerprint,
            message_files_parsed: tree.then_some(self.message_files_parsed),
            part_files_parsed: tree.then_some(self.part_files_parsed),
            warning: self.warning,
        }
    }
}

/// Serializable form of a local extraction, as it appears in reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalFingerprint {
    pub file: String,
    pub digest: String,
    #[serde(flatten)]
    pub fingerprint: Fingerprint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_files_parsed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_files_parsed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<ExtractionWarning>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanKind {
    JsonlNewest,
    #[serde(alias = "gemini_session_json_newest")]
    SessionJsonNewest,
    #[serde(alias = "opencode_storage_latest_session")]
    StorageTreeLatestSession,
}

impl ScanKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::JsonlNewest => "jsonl_newest",
            Self::SessionJsonNewest => "session_json_newest",
            Self::StorageTreeLatestSession => "storage_tree_latest_session",
        }
    }
}

impl std::fmt::Display for ScanKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ScanKind {
    type Err = EvidenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "jsonl_newest" | "jsonl" => Ok(Self::JsonlNewest),
            "session_json_newest" | "gemini_session_json_newest" | "session_json" => {
                Ok(Self::SessionJsonNewest)
            }
            "storage_tree_latest_session" | "opencode_storage_latest_session" | "storage_tree" => {
                Ok(Self::StorageTreeLatestSession)
            }
            _ => Err(EvidenceError::UnknownScanKind(s.to_string())),
        }
    }
}

/// Where to look for a producer's live session logs and how much to read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalSchemaSpec {
    pub kind: ScanKind,
    #[serde(default)]
    pub roots: Vec<String>,
    #[serde(default = "default_glob")]
    pub glob: String,
    #[serde(default)]
    pub max_lines: Option<usize>,
    #[serde(default)]
    pub max_messages: Option<usize>,
    #[serde(default)]
    pub max_parts: Option<usize>,
    /// Prefer the newest file that contains one of these record types.
    #[serde(default)]
    pub required_types: Vec<String>,
}

fn default_glob() -> String {
    "**/*".to_string()
}

impl LocalSchemaSpec {
    pub fn budget(&self) -> ScanBudget {
        let defaults = ScanBudget::for_kind(self.kind);
        ScanBudget {
            max_lines: self.max_lines.unwrap_or(defaults.max_lines),
            max_messages: self.max_messages.unwrap_or(defaults.max_messages),
            max_parts: self.max_parts.unwrap_or(defaults.max_parts),
        }
    }

    pub fn expanded_roots(&self) -> Vec<PathBuf> {
        self.roots.iter().map(|root| expand_path(root)).collect()
    }
}

/// Read limits for one extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanBudget {
    pub max_lines: usize,
    pub max_messages: usize,
    pub max_parts: usize,
}

impl ScanBudget {
    /// Fixture files are small and fully trusted.
    pub const BASELINE: ScanBudget = ScanBudget {
        max_lines: 5000,
        max_messages: 5000,
        max_parts: 5000,
    };

    pub fn for_kind(kind: ScanKind) -> Self {
        let max_messages = match kind {
            ScanKind::StorageTreeLatestSession => 250,
            _ => 2500,
        };
        Self {
            max_lines: 2500,
            max_messages,
            max_parts: 2500,
        }
    }
}

/// Extract one session file with the layout's extractor.
pub fn extract_with_kind(
    family: ProducerFamily,
    kind: ScanKind,
    path: &Path,
    budget: ScanBudget,
) -> Extraction {
    match kind {
        ScanKind::JsonlNewest => extract_jsonl(family, path, budget.max_lines),
        ScanKind::SessionJsonNewest => extract_session_json(family, path, budget.max_messages),
        ScanKind::StorageTreeLatestSession => {
            extract_storage_tree(family, path, budget.max_messages, budget.max_parts)
        }
    }
}

/// Result of a live scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalScan {
    Extracted(Extraction),
    NoFilesFound { roots: Vec<String>, glob: String, kind: ScanKind },
}

/// Find the newest matching session under the configured roots and extract it.
pub fn scan_local(family: ProducerFamily, spec: &LocalSchemaSpec) -> Result<LocalScan, EvidenceError> {
    let roots = spec.expanded_roots();
    let newest = match spec.kind {
        ScanKind::JsonlNewest if !spec.required_types.is_empty() => newest_file_with_types(
            &roots,
            &spec.glob,
            &spec.required_types,
            REQUIRED_TYPE_PROBE_LINES,
        )?,
        _ => newest_file(&roots, &spec.glob)?,
    };
    let Some(path) = newest else {
        tracing::debug!(%family, glob = %spec.glob, "no local session files found");
        return Ok(LocalScan::NoFilesFound {
            roots: spec.roots.clone(),
            glob: spec.glob.clone(),
            kind: spec.kind,
        });
    };
    tracing::debug!(%family, path = %path.display(), "extracting newest local session");
    Ok(LocalScan::Extracted(extract_with_kind(
        family,
        spec.kind,
        &path,
        spec.budget(),
    )))
}
