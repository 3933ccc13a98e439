//! Severity and recommendation decision table.
//!
//! [`decide`] is an ordered rule list: the first matching rule wins, so rule
//! order is priority. [`apply_compatibility_override`] runs strictly after it
//! and can only relax a decision, never escalate one.
//!
//! ```text
//! 1 monitoring_failed                              -> high   prepare_hotfix
//! 2 probe_failed && !upstream_degraded             -> high   prepare_hotfix
//! 3 probe_failed &&  upstream_degraded             -> medium monitor
//! 4 installed_newer                                -> medium run_weekly_now
//! 5 !upstream_newer && !installed_newer            -> none   ignore
//! 6 keyword_hits                                   -> medium run_weekly_now
//! 7 otherwise                                      -> low    monitor
//! 8 (weekly) installed_newer only, no schema drift -> low    bump_verified_version
//! ```

use serde::{Deserialize, Serialize};

use crate::error::KernelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Ignore,
    Monitor,
    RunWeeklyNow,
    BumpVerifiedVersion,
    PrepareHotfix,
}

impl Recommendation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ignore => "ignore",
            Self::Monitor => "monitor",
            Self::RunWeeklyNow => "run_weekly_now",
            Self::BumpVerifiedVersion => "bump_verified_version",
            Self::PrepareHotfix => "prepare_hotfix",
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every-poll (`daily`) or periodic deep (`weekly`) evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    Daily,
    Weekly,
}

impl EvaluationMode {
    pub fn is_deep(self) -> bool {
        matches!(self, Self::Weekly)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
        }
    }
}

impl std::fmt::Display for EvaluationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EvaluationMode {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            _ => Err(KernelError::UnknownEvaluationMode(s.to_string())),
        }
    }
}

/// Inputs to the decision table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeveritySignals {
    /// No configured upstream version source produced a version.
    pub monitoring_failed: bool,
    pub probe_failed: bool,
    /// The external service itself reports degradation.
    pub probe_failed_but_upstream_degraded: bool,
    pub upstream_newer_than_verified: bool,
    pub installed_newer_than_verified: bool,
    pub schema_or_usage_keyword_hits: bool,
}

/// Which rule produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionRule {
    MonitoringFailed,
    ProbeFailed,
    ProbeFailedUpstreamDegraded,
    InstalledNewer,
    UpToDate,
    KeywordHits,
    UpstreamNewer,
    CompatibleSchema,
}

impl DecisionRule {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MonitoringFailed => "monitoring_failed",
            Self::ProbeFailed => "probe_failed",
            Self::ProbeFailedUpstreamDegraded => "probe_failed_upstream_degraded",
            Self::InstalledNewer => "installed_newer",
            Self::UpToDate => "up_to_date",
            Self::KeywordHits => "keyword_hits",
            Self::UpstreamNewer => "upstream_newer",
            Self::CompatibleSchema => "compatible_schema",
        }
    }
}

impl std::fmt::Display for DecisionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityDecision {
    pub severity: Severity,
    pub recommendation: Recommendation,
    pub rule: DecisionRule,
}

impl SeverityDecision {
    fn new(severity: Severity, recommendation: Recommendation, rule: DecisionRule) -> Self {
        Self {
            severity,
            recommendation,
            rule,
        }
    }

    /// Whether this decision should interrupt someone in `mode`.
    ///
    /// Weekly runs are expected reviews, so anything above `none` counts.
    /// Daily runs stay quiet for `low`.
    pub fn is_actionable(&self, mode: EvaluationMode) -> bool {
        match mode {
            EvaluationMode::Weekly => self.severity != Severity::None,
            EvaluationMode::Daily => self.severity >= Severity::Medium,
        }
    }
}

/// Rules 1-7.
pub fn decide(signals: &SeveritySignals) -> SeverityDecision {
    use DecisionRule as R;
    use Recommendation as Rec;

    if signals.monitoring_failed {
        return SeverityDecision::new(Severity::High, Rec::PrepareHotfix, R::MonitoringFailed);
    }
    if signals.probe_failed && !signals.probe_failed_but_upstream_degraded {
        return SeverityDecision::new(Severity::High, Rec::PrepareHotfix, R::ProbeFailed);
    }
    if signals.probe_failed && signals.probe_failed_but_upstream_degraded {
        return SeverityDecision::new(
            Severity::Medium,
            Rec::Monitor,
            R::ProbeFailedUpstreamDegraded,
        );
    }
    if signals.installed_newer_than_verified {
        return SeverityDecision::new(Severity::Medium, Rec::RunWeeklyNow, R::InstalledNewer);
    }
    if !signals.upstream_newer_than_verified && !signals.installed_newer_than_verified {
        return SeverityDecision::new(Severity::None, Rec::Ignore, R::UpToDate);
    }
    if signals.schema_or_usage_keyword_hits {
        return SeverityDecision::new(Severity::Medium, Rec::RunWeeklyNow, R::KeywordHits);
    }
    SeverityDecision::new(Severity::Low, Rec::Monitor, R::UpstreamNewer)
}

/// Rule 8: concrete evidence of compatibility relaxes a version-number alarm.
///
/// Fires only in deep mode, only for `low`/`medium` decisions whose sole
/// cause is `installed_newer_than_verified`, and only when a live schema
/// comparison ran and found no drift (`schema_drift == Some(false)`).
/// Keyword hits and probe failures block it.
pub fn apply_compatibility_override(
    decision: SeverityDecision,
    signals: &SeveritySignals,
    mode: EvaluationMode,
    schema_drift: Option<bool>,
) -> SeverityDecision {
    let relaxable = matches!(decision.severity, Severity::Low | Severity::Medium);
    let sole_cause = signals.installed_newer_than_verified
        && !signals.monitoring_failed
        && !signals.probe_failed
        && !signals.schema_or_usage_keyword_hits;

    if mode.is_deep() && relaxable && sole_cause && schema_drift == Some(false) {
        return SeverityDecision::new(
            Severity::Low,
            Recommendation::BumpVerifiedVersion,
            DecisionRule::CompatibleSchema,
        );
    }
    decision
}

/// Rules 1-8 in order.
pub fn evaluate(
    signals: &SeveritySignals,
    mode: EvaluationMode,
    schema_drift: Option<bool>,
) -> SeverityDecision {
    apply_compatibility_override(decide(signals), signals, mode, schema_drift)
}
