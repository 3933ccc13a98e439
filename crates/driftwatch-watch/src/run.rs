//! One monitoring pass over every configured producer.
//!
//! Each producer is evaluated on its own: a failure for one never stops
//! the others, and every failure mode ends up as a value in that
//! producer's [`AgentReport`].

use driftwatch_evidence::{LocalScan, build_baseline, scan_local};
use driftwatch_kernel::{
    EvaluationMode, ProducerFamily, SeveritySignals, diff, evaluate, extract_semver, is_newer,
};
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::{AgentConfig, SupportMatrix, WatchConfig};
use crate::keywords::scan_upstream;
use crate::probe::{CommandRunner, installed_version, run_probe, upstream_degraded};
use crate::report::{
    AgentReport, BaselineReport, EvidenceSummary, LocalSchemaReport, Risk, VersionDiff,
    WatchReport, WeeklyDetails,
};
use crate::upstream::{HttpFetch, resolve_upstream};

/// Deep-mode evidence for one producer.
struct WeeklyOutcome {
    details: WeeklyDetails,
    schema_matches_baseline: Option<bool>,
    probe_failed: bool,
    probe_failed_but_upstream_degraded: bool,
}

pub struct WatchRunner<'a> {
    config: &'a WatchConfig,
    matrix: &'a SupportMatrix,
    http: &'a dyn HttpFetch,
    runner: &'a dyn CommandRunner,
}

impl<'a> WatchRunner<'a> {
    pub fn new(
        config: &'a WatchConfig,
        matrix: &'a SupportMatrix,
        http: &'a dyn HttpFetch,
        runner: &'a dyn CommandRunner,
    ) -> Self {
        Self {
            config,
            matrix,
            http,
            runner,
        }
    }

    /// Evaluate every producer whose cadence enables `mode`.
    ///
    /// `config_label` and `report_dir` are recorded in the report as given;
    /// nothing is written here.
    pub fn run(
        &self,
        mode: EvaluationMode,
        config_label: &str,
        report_dir: &Path,
        now: chrono::DateTime<chrono::Utc>,
    ) -> WatchReport {
        let mut results = BTreeMap::new();
        let mut summary_lines = Vec::new();
        for (family, agent) in self.config.agents_for(mode) {
            let _span = tracing::info_span!("agent", %family).entered();
            let report = self.evaluate_agent(family, agent, mode);
            if report.severity != driftwatch_kernel::Severity::None {
                summary_lines.push(report.summary_line(family));
            }
            results.insert(family, report);
        }
        let any_actionable = results.values().any(|report| report.actionable);
        WatchReport {
            timestamp_utc: now.to_rfc3339(),
            mode,
            config: config_label.to_string(),
            report_dir: report_dir.display().to_string(),
            results,
            summary_lines,
            any_actionable,
        }
    }

    pub fn evaluate_agent(
        &self,
        family: ProducerFamily,
        agent: &AgentConfig,
        mode: EvaluationMode,
    ) -> AgentReport {
        let verified = self.matrix.verified_version(family).map(str::to_string);
        let verified_semver = verified.as_deref().and_then(extract_semver);

        let installed = installed_version(agent.installed_version_cmd.as_deref(), self.runner);
        let upstream = resolve_upstream(&agent.upstream, self.http);
        let hits = scan_upstream(upstream.source_used.as_ref(), &agent.risk_keywords);

        let versions = VersionDiff {
            upstream_newer_than_verified: is_newer(
                upstream.parsed_version.as_deref(),
                verified_semver.as_deref(),
            ),
            installed_newer_than_verified: is_newer(
                installed.parsed_version.as_deref(),
                verified_semver.as_deref(),
            ),
        };

        let weekly = mode.is_deep().then(|| self.weekly(family, agent));
        let (probe_failed, probe_failed_but_upstream_degraded, schema_matches_baseline) =
            weekly.as_ref().map_or((false, false, None), |w| {
                (
                    w.probe_failed,
                    w.probe_failed_but_upstream_degraded,
                    w.schema_matches_baseline,
                )
            });

        let signals = SeveritySignals {
            monitoring_failed: upstream.monitoring_failed(),
            probe_failed,
            probe_failed_but_upstream_degraded,
            upstream_newer_than_verified: versions.upstream_newer_than_verified,
            installed_newer_than_verified: versions.installed_newer_than_verified,
            schema_or_usage_keyword_hits: hits.any(),
        };
        let decision = evaluate(&signals, mode, schema_matches_baseline.map(|matches| !matches));
        tracing::debug!(
            %family,
            severity = %decision.severity,
            recommendation = %decision.recommendation,
            "agent evaluated"
        );

        let weekly = weekly.map(|w| w.details);
        let evidence = EvidenceSummary {
            schema_matches_baseline,
            schema_diff: weekly.as_ref().and_then(|w| w.schema_diff.clone()),
        };
        AgentReport {
            verified_version: verified,
            risk: Risk {
                monitoring_failed: signals.monitoring_failed,
                keywords: hits,
            },
            installed,
            upstream,
            diff: versions,
            weekly,
            evidence,
            severity: decision.severity,
            recommendation: decision.recommendation,
            rule: decision.rule,
            actionable: decision.is_actionable(mode),
        }
    }

    fn weekly(&self, family: ProducerFamily, agent: &AgentConfig) -> WeeklyOutcome {
        let mut outcome = WeeklyOutcome {
            details: WeeklyDetails::default(),
            schema_matches_baseline: None,
            probe_failed: false,
            probe_failed_but_upstream_degraded: false,
        };

        if let Some(spec) = &agent.weekly.local_schema {
            match scan_local(family, spec) {
                Ok(LocalScan::Extracted(extraction)) => {
                    let baseline = build_baseline(
                        family,
                        self.matrix.evidence_fixtures(family),
                        self.matrix.base_dir(),
                    );
                    if !baseline.is_empty() {
                        let schema_diff = diff(&extraction.fingerprint(), &baseline.fingerprint);
                        outcome.schema_matches_baseline = Some(!schema_diff.drift);
                        outcome.details.baseline_schema = Some(BaselineReport {
                            digest: baseline.fingerprint.digest(),
                            type_keys: baseline.fingerprint.type_keys.clone(),
                            fixtures: baseline.fixtures,
                            missing: baseline.missing,
                        });
                        outcome.details.schema_diff = Some(schema_diff);
                    } else {
                        tracing::info!(%family, "no baseline fixtures; schema comparison skipped");
                    }
                    outcome.details.local_schema = Some(LocalSchemaReport::Extracted(extraction.summary()));
                }
                Ok(LocalScan::NoFilesFound { roots, glob, kind }) => {
                    outcome.details.local_schema = Some(LocalSchemaReport::NotFound {
                        error: driftwatch_evidence::ExtractionWarning::NoFilesFound,
                        roots,
                        glob,
                        kind,
                    });
                }
                Err(error) => {
                    tracing::warn!(%family, %error, "local schema scan failed");
                    outcome.details.local_schema = Some(LocalSchemaReport::ScanFailed {
                        error: error.to_string(),
                    });
                }
            }
        }

        let probes: Vec<_> = agent
            .weekly
            .probes
            .iter()
            .map(|spec| run_probe(spec, self.runner))
            .collect();
        outcome.probe_failed = probes.iter().any(|probe| !probe.ok);
        outcome.probe_failed_but_upstream_degraded = upstream_degraded(&probes);
        outcome.details.probes = probes;
        outcome
    }
}
