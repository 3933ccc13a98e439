//! Warnings and errors from evidence access.
//!
//! Bad input data is never an error here. Missing directories and
//! unreadable files become [`ExtractionWarning`] values on a partial
//! extraction; malformed JSON is counted and skipped.

use serde::{Deserialize, Serialize};

/// Non-fatal condition attached to a partial extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionWarning {
    /// No file matched the configured roots and glob.
    NoFilesFound,
    /// The source file exists in the listing but could not be read.
    SourceUnreadable,
    /// A linked-tree session has no `id`, so children cannot be located.
    SessionIdMissing,
    /// No ancestor of the session file holds `session/`, `message/`, `part/`.
    StorageRootNotFound,
    /// The session's `message/<id>/` directory is absent.
    MessageDirNotFound,
}

impl ExtractionWarning {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoFilesFound => "no_files_found",
            Self::SourceUnreadable => "source_unreadable",
            Self::SessionIdMissing => "session_id_missing",
            Self::StorageRootNotFound => "storage_root_not_found",
            Self::MessageDirNotFound => "message_dir_not_found",
        }
    }
}

impl std::fmt::Display for ExtractionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that stop evidence access outright.
#[derive(Debug, thiserror::Error)]
pub enum EvidenceError {
    #[error("invalid glob pattern `{pattern}`: {message}")]
    Glob { pattern: String, message: String },

    #[error("unknown scan kind: {0}")]
    UnknownScanKind(String),
}
