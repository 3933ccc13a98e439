//! Whole watch passes against fake HTTP and process adapters.

use chrono::TimeZone;
use driftwatch_evidence::{LocalSchemaSpec, ScanKind};
use driftwatch_kernel::{DecisionRule, EvaluationMode, ProducerFamily, Recommendation, Severity};
use driftwatch_watch::{
    AgentConfig, Cadence, CommandRunner, FsReportSink, HttpFetch, LocalSchemaReport,
    ProbeOutcome, ProbeParse, ProbeSpec, ReportSink, RiskKeywords, SupportMatrix,
    UpstreamSource, WatchConfig, WatchReport, WatchRunner, WeeklyConfig, run_dir,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

struct TempDirGuard {
    path: PathBuf,
}

impl TempDirGuard {
    fn new(prefix: &str) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time should be after unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "driftwatch-watch-{prefix}-{}-{nanos}",
            std::process::id()
        ));
        fs::create_dir_all(&path).expect("temp dir should be created");
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.path.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("parent dir should be created");
        }
        fs::write(&path, contents).expect("fixture file should be written");
        path
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

struct FakeHttp(BTreeMap<String, String>);

impl HttpFetch for FakeHttp {
    fn get_text(&self, url: &str) -> Result<String, String> {
        self.0.get(url).cloned().ok_or_else(|| "HTTP 404".to_string())
    }
}

const CODEX_NPM_URL: &str = "https://registry.npmjs.org/%40openai%2Fcodex/latest";

fn npm_says(version: &str) -> FakeHttp {
    FakeHttp(BTreeMap::from([(
        CODEX_NPM_URL.to_string(),
        format!("{{\"version\":\"{version}\"}}"),
    )]))
}

/// Answers by program name; anything unknown is "not found".
struct FakeRunner(BTreeMap<&'static str, (i32, String)>);

impl CommandRunner for FakeRunner {
    fn run(&self, argv: &[String], _timeout: Duration) -> ProbeOutcome {
        match argv.first().and_then(|program| self.0.get(program.as_str())) {
            Some((exit_code, stdout)) => ProbeOutcome::Completed {
                exit_code: *exit_code,
                stdout: stdout.clone(),
                stderr: String::new(),
            },
            None => ProbeOutcome::SpawnFailed {
                not_found: true,
                message: format!("Command not found: {}", argv.join(" ")),
            },
        }
    }
}

fn codex_installed(version: &str) -> FakeRunner {
    FakeRunner(BTreeMap::from([("codex", (0, format!("codex-cli {version}")))]))
}

const BASELINE_SESSION: &str = concat!(
    "{\"type\":\"session_meta\",\"timestamp\":\"t0\",\"payload\":{}}\n",
    "{\"type\":\"response_item\",\"timestamp\":\"t1\",\"payload\":{}}\n",
);

const DRIFTED_SESSION: &str = concat!(
    "{\"type\":\"session_meta\",\"timestamp\":\"t0\",\"payload\":{},\"attachments\":[]}\n",
    "{\"type\":\"response_item\",\"timestamp\":\"t1\",\"payload\":{}}\n",
);

const MATRIX: &str = r#"
[agents.codex_cli]
max_verified_version = "0.73.0"
evidence_fixtures = [
  "fixtures/codex/session.jsonl",
  "fixtures/codex/session_schema_drift.jsonl",
]
"#;

/// Workspace with baseline fixtures, a matrix and one live session.
fn workspace(prefix: &str, live_session: &str) -> (TempDirGuard, SupportMatrix) {
    let tmp = TempDirGuard::new(prefix);
    tmp.write("fixtures/codex/session.jsonl", BASELINE_SESSION);
    tmp.write("fixtures/codex/session_schema_drift.jsonl", DRIFTED_SESSION);
    tmp.write("live/2026/01/rollout-1.jsonl", live_session);
    let matrix_path = tmp.write("support_matrix.toml", MATRIX);
    let matrix = SupportMatrix::load(&matrix_path).expect("matrix should load");
    (tmp, matrix)
}

fn codex_agent(live_root: &Path, probes: Vec<ProbeSpec>) -> AgentConfig {
    AgentConfig {
        cadence: Cadence {
            daily: true,
            weekly: true,
        },
        installed_version_cmd: Some(vec!["codex".to_string(), "--version".to_string()]),
        upstream: vec![UpstreamSource::NpmLatest {
            package: "@openai/codex".to_string(),
        }],
        risk_keywords: RiskKeywords {
            schema: vec!["schema".to_string()],
            usage: vec!["rate limit".to_string()],
        },
        weekly: WeeklyConfig {
            local_schema: Some(LocalSchemaSpec {
                kind: ScanKind::JsonlNewest,
                roots: vec![live_root.display().to_string()],
                glob: "**/*.jsonl".to_string(),
                max_lines: None,
                max_messages: None,
                max_parts: None,
                required_types: Vec::new(),
            }),
            probes,
        },
    }
}

fn config_with(agents: Vec<(ProducerFamily, AgentConfig)>) -> WatchConfig {
    WatchConfig {
        report_root: None,
        agents: agents.into_iter().collect(),
    }
}

fn run(
    config: &WatchConfig,
    matrix: &SupportMatrix,
    http: &dyn HttpFetch,
    runner: &dyn CommandRunner,
    mode: EvaluationMode,
) -> WatchReport {
    let now = chrono::Utc
        .with_ymd_and_hms(2026, 1, 2, 3, 4, 5)
        .single()
        .expect("valid timestamp");
    WatchRunner::new(config, matrix, http, runner).run(
        mode,
        "watch.json",
        &run_dir(Path::new("reports"), now),
        now,
    )
}

#[test]
fn daily_pass_is_quiet_when_everything_matches_the_matrix() {
    let (tmp, matrix) = workspace("quiet", BASELINE_SESSION);
    let config = config_with(vec![(
        ProducerFamily::Codex,
        codex_agent(&tmp.path().join("live"), Vec::new()),
    )]);

    let report = run(
        &config,
        &matrix,
        &npm_says("0.73.0"),
        &codex_installed("0.73.0"),
        EvaluationMode::Daily,
    );

    let codex = &report.results[&ProducerFamily::Codex];
    assert_eq!(codex.severity, Severity::None);
    assert_eq!(codex.recommendation, Recommendation::Ignore);
    assert!(codex.weekly.is_none());
    assert_eq!(codex.evidence.schema_matches_baseline, None);
    assert!(report.summary_lines.is_empty());
    assert!(!report.any_actionable);
    assert_eq!(report.report_dir, "reports/20260102-030405Z");
}

#[test]
fn weekly_pass_relaxes_installed_newer_when_schema_matches() {
    let (tmp, matrix) = workspace("compatible", BASELINE_SESSION);
    let config = config_with(vec![(
        ProducerFamily::Codex,
        codex_agent(&tmp.path().join("live"), Vec::new()),
    )]);
    let http = npm_says("0.74.0");
    let runner = codex_installed("0.74.0");

    let daily = run(&config, &matrix, &http, &runner, EvaluationMode::Daily);
    let codex = &daily.results[&ProducerFamily::Codex];
    assert_eq!(
        (codex.severity, codex.recommendation),
        (Severity::Medium, Recommendation::RunWeeklyNow)
    );

    let weekly = run(&config, &matrix, &http, &runner, EvaluationMode::Weekly);
    let codex = &weekly.results[&ProducerFamily::Codex];
    assert_eq!(codex.severity, Severity::Low);
    assert_eq!(codex.recommendation, Recommendation::BumpVerifiedVersion);
    assert_eq!(codex.rule, DecisionRule::CompatibleSchema);
    assert!(codex.actionable);
    assert_eq!(codex.evidence.schema_matches_baseline, Some(true));
    assert!(codex.diff.installed_newer_than_verified);
    assert!(codex.diff.upstream_newer_than_verified);

    let details = codex.weekly.as_ref().expect("weekly details");
    let baseline = details.baseline_schema.as_ref().expect("baseline compared");
    assert_eq!(baseline.fixtures, vec!["fixtures/codex/session.jsonl".to_string()]);
    assert!(baseline.missing.is_empty());
    assert!(matches!(
        details.local_schema,
        Some(LocalSchemaReport::Extracted(_))
    ));

    assert_eq!(
        weekly.summary_lines,
        vec![
            "codex: severity=low verified=0.73.0 installed=0.74.0 upstream=0.74.0 rec=bump_verified_version"
                .to_string()
        ]
    );
    assert!(weekly.any_actionable);
}

#[test]
fn weekly_pass_reports_unknown_keys_as_drift() {
    let (tmp, matrix) = workspace("drift", DRIFTED_SESSION);
    let config = config_with(vec![(
        ProducerFamily::Codex,
        codex_agent(&tmp.path().join("live"), Vec::new()),
    )]);

    let report = run(
        &config,
        &matrix,
        &npm_says("0.74.0"),
        &codex_installed("0.74.0"),
        EvaluationMode::Weekly,
    );

    let codex = &report.results[&ProducerFamily::Codex];
    assert_eq!(codex.severity, Severity::Medium);
    assert_eq!(codex.recommendation, Recommendation::RunWeeklyNow);
    assert_eq!(codex.evidence.schema_matches_baseline, Some(false));
    let schema_diff = codex.evidence.schema_diff.as_ref().expect("diff recorded");
    assert!(schema_diff.drift);
    assert!(
        schema_diff.unknown_keys["session_meta"].contains("attachments"),
        "{schema_diff:?}"
    );
}

#[test]
fn one_producer_failing_upstream_does_not_stop_the_others() {
    let (tmp, matrix) = workspace("isolated", BASELINE_SESSION);
    let claude = AgentConfig {
        cadence: Cadence {
            daily: true,
            weekly: false,
        },
        upstream: vec![
            UpstreamSource::GithubLatestRelease {
                repo: "anthropics/claude-code".to_string(),
            },
            UpstreamSource::Unsupported,
        ],
        ..AgentConfig::default()
    };
    let config = config_with(vec![
        (
            ProducerFamily::Codex,
            codex_agent(&tmp.path().join("live"), Vec::new()),
        ),
        (ProducerFamily::Claude, claude),
    ]);

    let report = run(
        &config,
        &matrix,
        &npm_says("0.73.0"),
        &codex_installed("0.73.0"),
        EvaluationMode::Daily,
    );

    let claude = &report.results[&ProducerFamily::Claude];
    assert_eq!(claude.severity, Severity::High);
    assert_eq!(claude.recommendation, Recommendation::PrepareHotfix);
    assert!(claude.risk.monitoring_failed);
    assert_eq!(claude.upstream.errors.len(), 2);
    assert_eq!(claude.installed.exit_code, driftwatch_watch::EXIT_NOT_FOUND);

    assert_eq!(
        report.results[&ProducerFamily::Codex].severity,
        Severity::None
    );
    assert_eq!(report.summary_lines.len(), 1);
    assert!(report.summary_lines[0].starts_with("claude: severity=high"));
    assert!(report.any_actionable);
}

#[test]
fn failed_probe_is_softened_when_status_reports_an_incident() {
    let (tmp, matrix) = workspace("probes", BASELINE_SESSION);
    let probes = vec![
        ProbeSpec {
            label: "usage".to_string(),
            argv: vec!["usage-probe".to_string()],
            timeout_seconds: 5,
            parse: Some(ProbeParse::OkJson),
        },
        ProbeSpec {
            label: "status".to_string(),
            argv: vec!["status-probe".to_string()],
            timeout_seconds: 5,
            parse: Some(ProbeParse::StatusJson),
        },
    ];
    let config = config_with(vec![(
        ProducerFamily::Codex,
        codex_agent(&tmp.path().join("live"), probes),
    )]);
    let http = npm_says("0.73.0");

    let healthy_status = FakeRunner(BTreeMap::from([
        ("codex", (0, "codex-cli 0.73.0".to_string())),
        ("usage-probe", (1, "{\"ok\":false}".to_string())),
        ("status-probe", (0, "{\"ok\":true,\"indicator\":\"none\",\"incidents_count\":0}".to_string())),
    ]));
    let report = run(&config, &matrix, &http, &healthy_status, EvaluationMode::Weekly);
    let codex = &report.results[&ProducerFamily::Codex];
    assert_eq!(
        (codex.severity, codex.rule),
        (Severity::High, DecisionRule::ProbeFailed)
    );

    let incident = FakeRunner(BTreeMap::from([
        ("codex", (0, "codex-cli 0.73.0".to_string())),
        ("usage-probe", (1, "{\"ok\":false}".to_string())),
        ("status-probe", (0, "{\"ok\":true,\"indicator\":\"minor\",\"incidents_count\":1}".to_string())),
    ]));
    let report = run(&config, &matrix, &http, &incident, EvaluationMode::Weekly);
    let codex = &report.results[&ProducerFamily::Codex];
    assert_eq!(codex.severity, Severity::Medium);
    assert_eq!(codex.recommendation, Recommendation::Monitor);
    assert_eq!(codex.rule, DecisionRule::ProbeFailedUpstreamDegraded);
    let probes = &codex.weekly.as_ref().expect("weekly details").probes;
    assert_eq!(probes.len(), 2);
    assert!(!probes[0].ok);
    assert!(probes[1].ok);
}

#[test]
fn missing_live_sessions_are_recorded_not_fatal() {
    let (tmp, matrix) = workspace("nolive", BASELINE_SESSION);
    let config = config_with(vec![(
        ProducerFamily::Codex,
        codex_agent(&tmp.path().join("nowhere"), Vec::new()),
    )]);

    let report = run(
        &config,
        &matrix,
        &npm_says("0.74.0"),
        &codex_installed("0.74.0"),
        EvaluationMode::Weekly,
    );

    let codex = &report.results[&ProducerFamily::Codex];
    assert!(matches!(
        codex.weekly.as_ref().and_then(|w| w.local_schema.as_ref()),
        Some(LocalSchemaReport::NotFound { .. })
    ));
    assert_eq!(codex.evidence.schema_matches_baseline, None);
    assert_eq!(
        (codex.severity, codex.recommendation),
        (Severity::Medium, Recommendation::RunWeeklyNow)
    );
}

#[test]
fn sink_writes_a_readable_report() {
    let (tmp, matrix) = workspace("sink", BASELINE_SESSION);
    let config = config_with(vec![(
        ProducerFamily::Codex,
        codex_agent(&tmp.path().join("live"), Vec::new()),
    )]);
    let report = run(
        &config,
        &matrix,
        &npm_says("0.74.0"),
        &codex_installed("0.74.0"),
        EvaluationMode::Weekly,
    );

    let out_dir = tmp.path().join("reports/run");
    let path = FsReportSink::in_dir(&out_dir)
        .write_report(&report)
        .expect("report should be written");
    assert_eq!(path, out_dir.join("report.json"));

    let text = fs::read_to_string(&path).expect("report readable");
    let value: serde_json::Value = serde_json::from_str(&text).expect("report is JSON");
    assert_eq!(value["mode"], "weekly");
    assert_eq!(value["results"]["codex"]["severity"], "low");
    assert_eq!(value["results"]["codex"]["recommendation"], "bump_verified_version");
    assert_eq!(value["results"]["codex"]["upstream"]["parsed_version"], "0.74.0");
    assert_eq!(value["any_actionable"], true);
}
