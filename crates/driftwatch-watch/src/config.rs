//! Watch configuration (JSON) and the support matrix (TOML).
//!
//! Both are loaded once per run and passed by reference; nothing here is
//! global.

use driftwatch_evidence::{LocalSchemaSpec, expand_path};
use driftwatch_kernel::{EvaluationMode, ProducerFamily};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::WatchError;
use crate::probe::ProbeSpec;
use crate::upstream::UpstreamSource;

pub const DEFAULT_REPORT_ROOT: &str = "driftwatch-reports";

/// Which evaluation modes a producer takes part in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cadence {
    pub daily: bool,
    pub weekly: bool,
}

impl Cadence {
    pub fn enables(self, mode: EvaluationMode) -> bool {
        match mode {
            EvaluationMode::Daily => self.daily,
            EvaluationMode::Weekly => self.weekly,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskKeywords {
    pub schema: Vec<String>,
    pub usage: Vec<String>,
}

/// Deep-mode work for one producer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeeklyConfig {
    pub local_schema: Option<LocalSchemaSpec>,
    pub probes: Vec<ProbeSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub cadence: Cadence,
    pub installed_version_cmd: Option<Vec<String>>,
    /// Ranked; the first source that answers wins.
    pub upstream: Vec<UpstreamSource>,
    pub risk_keywords: RiskKeywords,
    pub weekly: WeeklyConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default)]
    pub report_root: Option<String>,
    #[serde(default)]
    pub agents: BTreeMap<ProducerFamily, AgentConfig>,
}

impl WatchConfig {
    pub fn from_json_str(text: &str, origin: &Path) -> Result<Self, WatchError> {
        serde_json::from_str(text).map_err(|e| WatchError::config(origin, e))
    }

    pub fn load(path: &Path) -> Result<Self, WatchError> {
        let text = std::fs::read_to_string(path).map_err(|e| WatchError::config(path, e))?;
        Self::from_json_str(&text, path)
    }

    /// `report_root` with `~` and `$VAR` expanded, or the default.
    pub fn report_root(&self) -> PathBuf {
        expand_path(self.report_root.as_deref().unwrap_or(DEFAULT_REPORT_ROOT))
    }

    /// Producers whose cadence enables `mode`, in family order.
    pub fn agents_for(&self, mode: EvaluationMode) -> impl Iterator<Item = (ProducerFamily, &AgentConfig)> {
        self.agents
            .iter()
            .filter(move |(_, agent)| agent.cadence.enables(mode))
            .map(|(family, agent)| (*family, agent))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixEntry {
    pub max_verified_version: Option<String>,
    pub evidence_fixtures: Vec<String>,
}

/// Last verified version and baseline fixtures per producer.
///
/// ```toml
/// [agents.codex_cli]
/// max_verified_version = "0.73.0"
/// evidence_fixtures = ["fixtures/codex/session.jsonl"]
/// ```
///
/// Agent keys may use either the short family name or the long product
/// name (`codex_cli`, `claude_code`, ...). Relative fixture paths resolve
/// against [`SupportMatrix::base_dir`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SupportMatrix {
    #[serde(default)]
    agents: BTreeMap<String, MatrixEntry>,
    #[serde(skip)]
    base_dir: PathBuf,
}

impl SupportMatrix {
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, WatchError> {
        let mut matrix: SupportMatrix =
            toml::from_str(text).map_err(|e| WatchError::config(origin, e))?;
        for key in matrix.agents.keys() {
            if key.parse::<ProducerFamily>().is_err() {
                tracing::warn!(agent = %key, "support matrix names an unknown producer");
            }
        }
        matrix.base_dir = origin
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(matrix)
    }

    pub fn load(path: &Path) -> Result<Self, WatchError> {
        let text = std::fs::read_to_string(path).map_err(|e| WatchError::config(path, e))?;
        Self::from_toml_str(&text, path)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn entry(&self, family: ProducerFamily) -> Option<&MatrixEntry> {
        self.agents
            .iter()
            .find(|(key, _)| key.parse::<ProducerFamily>().ok() == Some(family))
            .map(|(_, entry)| entry)
    }

    pub fn verified_version(&self, family: ProducerFamily) -> Option<&str> {
        self.entry(family)?
            .max_verified_version
            .as_deref()
            .filter(|version| !version.is_empty())
    }

    pub fn evidence_fixtures(&self, family: ProducerFamily) -> &[String] {
        self.entry(family)
            .map(|entry| entry.evidence_fixtures.as_slice())
            .unwrap_or_default()
    }
}
