//! Logical records: the uniform unit every producer layout is reduced to.
//!
//! A producer writes whatever shape it likes to disk. Extraction flattens
//! each on-disk object into a [`Record`]: which family emitted it, which
//! logical type bucket it belongs to, and the set of top-level field names.
//! Nothing downstream looks at field values.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::error::KernelError;

/// Bucket for objects that carry neither a `type` nor a `role` discriminator.
pub const MISSING_TYPE: &str = "<missing-type>";

/// One external agent tool whose log format is understood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProducerFamily {
    Codex,
    Claude,
    Copilot,
    Droid,
    Gemini,
    Opencode,
}

impl ProducerFamily {
    pub const ALL: [ProducerFamily; 6] = [
        Self::Codex,
        Self::Claude,
        Self::Copilot,
        Self::Droid,
        Self::Gemini,
        Self::Opencode,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Codex => "codex",
            Self::Claude => "claude",
            Self::Copilot => "copilot",
            Self::Droid => "droid",
            Self::Gemini => "gemini",
            Self::Opencode => "opencode",
        }
    }
}

impl std::fmt::Display for ProducerFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProducerFamily {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "codex" | "codex_cli" => Ok(Self::Codex),
            "claude" | "claude_code" => Ok(Self::Claude),
            "copilot" | "copilot_cli" => Ok(Self::Copilot),
            "droid" => Ok(Self::Droid),
            "gemini" | "gemini_cli" => Ok(Self::Gemini),
            "opencode" => Ok(Self::Opencode),
            _ => Err(KernelError::UnknownProducerFamily(s.to_string())),
        }
    }
}

/// Where a record came from. Opaque to the kernel; carried for reports.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawRef {
    pub source: PathBuf,
    /// Line number (JSONL) or array index (session JSON); `None` for
    /// single-object files.
    pub index: Option<usize>,
}

impl RawRef {
    pub fn new(source: impl Into<PathBuf>, index: Option<usize>) -> Self {
        Self {
            source: source.into(),
            index,
        }
    }
}

/// One logical record. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    producer: ProducerFamily,
    logical_type: String,
    fields: BTreeSet<String>,
    raw: RawRef,
}

impl Record {
    pub fn new(
        producer: ProducerFamily,
        logical_type: impl Into<String>,
        fields: impl IntoIterator<Item = String>,
        raw: RawRef,
    ) -> Self {
        let logical_type = logical_type.into();
        let logical_type = if logical_type.is_empty() {
            MISSING_TYPE.to_string()
        } else {
            logical_type
        };
        Self {
            producer,
            logical_type,
            fields: fields.into_iter().collect(),
            raw,
        }
    }

    /// Build a record from a JSON object using the default discriminator
    /// rule (see [`infer_logical_type`]).
    pub fn from_object(producer: ProducerFamily, obj: &Map<String, Value>, raw: RawRef) -> Self {
        Self::with_type(producer, infer_logical_type(obj), obj, raw)
    }

    /// Build a record from a JSON object with a caller-chosen logical type.
    pub fn with_type(
        producer: ProducerFamily,
        logical_type: impl Into<String>,
        obj: &Map<String, Value>,
        raw: RawRef,
    ) -> Self {
        Self::new(producer, logical_type, obj.keys().cloned(), raw)
    }

    pub fn producer(&self) -> ProducerFamily {
        self.producer
    }

    pub fn logical_type(&self) -> &str {
        &self.logical_type
    }

    pub fn fields(&self) -> &BTreeSet<String> {
        &self.fields
    }

    pub fn raw(&self) -> &RawRef {
        &self.raw
    }
}

/// Non-empty string value of `key`, if any.
pub fn discriminator<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

/// Logical type of an object: explicit `type`, else structural `role`,
/// else [`MISSING_TYPE`].
pub fn infer_logical_type(obj: &Map<String, Value>) -> String {
    discriminator(obj, "type")
        .or_else(|| discriminator(obj, "role"))
        .unwrap_or(MISSING_TYPE)
        .to_string()
}

/// `<prefix>.<discriminator>` when the discriminator is present, else `<prefix>`.
pub fn prefixed_type(prefix: &str, obj: &Map<String, Value>, key: &str) -> String {
    match discriminator(obj, key) {
        Some(value) => format!("{prefix}.{value}"),
        None => prefix.to_string(),
    }
}
