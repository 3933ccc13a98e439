//! # Driftwatch Evidence
//!
//! Read-only access to producer logs on disk. Every extractor reduces a
//! layout to [`driftwatch_kernel::Record`]s; malformed input is counted,
//! never raised.
//!
//! | layout            | families                      | extractor                 |
//! |-------------------|-------------------------------|---------------------------|
//! | JSONL stream      | codex, claude, copilot, droid | [`extract_jsonl`]         |
//! | session document  | gemini                        | [`extract_session_json`]  |
//! | linked tree       | opencode                      | [`extract_storage_tree`]  |

pub mod baseline;
pub mod discover;
pub mod error;
pub mod extract;
pub mod jsonl;
pub mod session_json;
pub mod storage_tree;

pub use baseline::{Baseline, DRIFT_FIXTURE_MARKER, build_baseline};
pub use discover::{
    candidates_newest_first, expand_path, expand_path_with, home_dir, limit_by_mtime,
    list_matches, newest_file, newest_file_with_types,
};
pub use error::{EvidenceError, ExtractionWarning};
pub use extract::{
    Extraction, FamilyCapabilities, LocalFingerprint, LocalSchemaSpec, LocalScan,
    REQUIRED_TYPE_PROBE_LINES, ScanBudget, ScanKind, StoreLayout, capabilities,
    extract_with_kind, scan_local,
};
pub use jsonl::{extract_jsonl, jsonl_contains_any_type, tail_lines};
pub use session_json::{ROOT_TYPE, extract_session_json};
pub use storage_tree::{extract_storage_tree, extract_tree_fixture_file, storage_root_for};
