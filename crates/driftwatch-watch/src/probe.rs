//! External commands: installed-version checks and weekly probes.
//!
//! Every command runs under an explicit timeout. Missing binaries,
//! non-zero exits and timeouts are ordinary [`ProbeOutcome`] values.

use driftwatch_kernel::extract_semver;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::error::WatchError;

pub const EXIT_TIMED_OUT: i32 = 124;
pub const EXIT_NOT_FOUND: i32 = 127;
pub const INSTALLED_VERSION_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_PROBE_TIMEOUT_SECONDS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Completed {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
    TimedOut {
        after: Duration,
    },
    SpawnFailed {
        not_found: bool,
        message: String,
    },
}

impl ProbeOutcome {
    /// Shell-style exit code: 124 for a timeout, 127 for a missing binary.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Completed { exit_code, .. } => *exit_code,
            Self::TimedOut { .. } => EXIT_TIMED_OUT,
            Self::SpawnFailed { not_found: true, .. } => EXIT_NOT_FOUND,
            Self::SpawnFailed { .. } => 1,
        }
    }

    pub fn stdout(&self) -> &str {
        match self {
            Self::Completed { stdout, .. } => stdout,
            _ => "",
        }
    }

    pub fn stderr(&self) -> String {
        match self {
            Self::Completed { stderr, .. } => stderr.clone(),
            Self::TimedOut { after } => format!("Timed out after {}s", after.as_secs()),
            Self::SpawnFailed { message, .. } => message.clone(),
        }
    }

    pub fn timed_out(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code() == 0
    }
}

/// Runs one external command to completion or timeout.
pub trait CommandRunner {
    fn run(&self, argv: &[String], timeout: Duration) -> ProbeOutcome;
}

/// [`CommandRunner`] backed by `tokio::process` on a private
/// current-thread runtime. Timed-out children are killed.
#[derive(Debug)]
pub struct ProcessRunner {
    runtime: tokio::runtime::Runtime,
}

impl ProcessRunner {
    pub fn new() -> Result<Self, WatchError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| WatchError::Runtime(e.to_string()))?;
        Ok(Self { runtime })
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, argv: &[String], timeout: Duration) -> ProbeOutcome {
        let Some((program, args)) = argv.split_first() else {
            return ProbeOutcome::SpawnFailed {
                not_found: false,
                message: "empty argv".to_string(),
            };
        };
        self.runtime.block_on(async {
            let mut command = tokio::process::Command::new(program);
            command.args(args).kill_on_drop(true);
            match tokio::time::timeout(timeout, command.output()).await {
                Err(_) => {
                    tracing::warn!(%program, timeout_secs = timeout.as_secs(), "command timed out");
                    ProbeOutcome::TimedOut { after: timeout }
                }
                Ok(Err(err)) => {
                    let not_found = err.kind() == std::io::ErrorKind::NotFound;
                    let message = if not_found {
                        format!("Command not found: {program}")
                    } else {
                        format!("{program}: {err}")
                    };
                    ProbeOutcome::SpawnFailed { not_found, message }
                }
                Ok(Ok(output)) => ProbeOutcome::Completed {
                    exit_code: output.status.code().unwrap_or(-1),
                    stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                },
            }
        })
    }
}

/// Installed version as reported by the producer's own CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledVersion {
    pub argv: Option<Vec<String>>,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub parsed_version: Option<String>,
}

/// First semver in stdout, else its first whitespace-separated token.
pub fn parse_installed_version(stdout: &str) -> Option<String> {
    extract_semver(stdout).or_else(|| stdout.split_whitespace().next().map(str::to_string))
}

pub fn installed_version(argv: Option<&[String]>, runner: &dyn CommandRunner) -> InstalledVersion {
    let Some(argv) = argv.filter(|argv| !argv.is_empty()) else {
        return InstalledVersion {
            argv: None,
            exit_code: EXIT_NOT_FOUND,
            stdout: String::new(),
            stderr: "missing installed_version_cmd".to_string(),
            parsed_version: None,
        };
    };
    let outcome = runner.run(argv, INSTALLED_VERSION_TIMEOUT);
    InstalledVersion {
        argv: Some(argv.to_vec()),
        exit_code: outcome.exit_code(),
        stdout: outcome.stdout().to_string(),
        stderr: outcome.stderr(),
        parsed_version: parse_installed_version(outcome.stdout()),
    }
}

/// How a probe's stdout decides success beyond the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeParse {
    /// A JSON object with `"ok": true`.
    #[serde(alias = "claude_usage_json")]
    OkJson,
    /// Any JSON object.
    #[serde(alias = "codex_status_json")]
    JsonObject,
    /// A service-status object with `"ok": true`; also feeds the
    /// upstream-degraded signal.
    #[serde(alias = "claude_status_json")]
    StatusJson,
    /// Stdout lines, recorded as `{"lines": [...]}`. Exit code only.
    #[serde(alias = "capture_latest_sessions")]
    Lines,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeSpec {
    #[serde(default = "default_label")]
    pub label: String,
    #[serde(default)]
    pub argv: Vec<String>,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub parse: Option<ProbeParse>,
}

fn default_label() -> String {
    "probe".to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_PROBE_TIMEOUT_SECONDS
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeResult {
    pub label: String,
    pub argv: Vec<String>,
    pub exit_code: i32,
    pub timed_out: bool,
    pub ok: bool,
    pub parse: Option<ProbeParse>,
    pub parsed: Option<Value>,
    pub stdout: String,
    pub stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn parse_stdout(parse: Option<ProbeParse>, stdout: &str) -> Option<Value> {
    match parse? {
        ProbeParse::Lines => Some(serde_json::json!({ "lines": stdout.lines().collect::<Vec<_>>() })),
        _ if stdout.is_empty() => None,
        _ => serde_json::from_str(stdout).ok(),
    }
}

fn parse_accepts(parse: Option<ProbeParse>, parsed: Option<&Value>) -> bool {
    let ok_flag = || {
        parsed
            .and_then(Value::as_object)
            .and_then(|obj| obj.get("ok"))
            == Some(&Value::Bool(true))
    };
    match parse {
        None | Some(ProbeParse::Lines) => true,
        Some(ProbeParse::JsonObject) => parsed.is_some_and(Value::is_object),
        Some(ProbeParse::OkJson | ProbeParse::StatusJson) => ok_flag(),
    }
}

pub fn run_probe(spec: &ProbeSpec, runner: &dyn CommandRunner) -> ProbeResult {
    if spec.argv.is_empty() {
        return ProbeResult {
            label: spec.label.clone(),
            argv: Vec::new(),
            exit_code: EXIT_NOT_FOUND,
            timed_out: false,
            ok: false,
            parse: spec.parse,
            parsed: None,
            stdout: String::new(),
            stderr: String::new(),
            error: Some("invalid_probe_argv".to_string()),
        };
    }
    let outcome = runner.run(&spec.argv, Duration::from_secs(spec.timeout_seconds));
    let parsed = parse_stdout(spec.parse, outcome.stdout());
    let ok = outcome.succeeded() && parse_accepts(spec.parse, parsed.as_ref());
    if !ok {
        tracing::info!(label = %spec.label, exit_code = outcome.exit_code(), "probe failed");
    }
    ProbeResult {
        label: spec.label.clone(),
        argv: spec.argv.clone(),
        exit_code: outcome.exit_code(),
        timed_out: outcome.timed_out(),
        ok,
        parse: spec.parse,
        parsed,
        stdout: outcome.stdout().to_string(),
        stderr: outcome.stderr(),
        error: None,
    }
}

/// A status probe says the external service is unhealthy.
fn reports_degraded(result: &ProbeResult) -> bool {
    if result.parse != Some(ProbeParse::StatusJson) {
        return false;
    }
    let Some(Value::Object(status)) = &result.parsed else {
        return false;
    };
    let indicator = status
        .get("indicator")
        .and_then(Value::as_str)
        .is_some_and(|indicator| !matches!(indicator, "none" | "unknown"));
    let incidents = status
        .get("incidents_count")
        .and_then(Value::as_i64)
        .is_some_and(|count| count > 0);
    indicator || incidents
}

/// True when a status probe reports a degraded service and some other
/// probe failed: the failure is probably theirs, not ours.
pub fn upstream_degraded(results: &[ProbeResult]) -> bool {
    results.iter().enumerate().any(|(i, status)| {
        reports_degraded(status)
            && results
                .iter()
                .enumerate()
                .any(|(j, other)| j != i && !other.ok)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Scripted {
        outcome: ProbeOutcome,
        calls: RefCell<Vec<(Vec<String>, Duration)>>,
    }

    impl Scripted {
        fn new(outcome: ProbeOutcome) -> Self {
            Self {
                outcome,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl CommandRunner for Scripted {
        fn run(&self, argv: &[String], timeout: Duration) -> ProbeOutcome {
            self.calls.borrow_mut().push((argv.to_vec(), timeout));
            self.outcome.clone()
        }
    }

    fn completed(exit_code: i32, stdout: &str) -> ProbeOutcome {
        ProbeOutcome::Completed {
            exit_code,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    fn spec(parse: Option<ProbeParse>) -> ProbeSpec {
        ProbeSpec {
            label: "p".to_string(),
            argv: vec!["tool".to_string(), "status".to_string()],
            timeout_seconds: 5,
            parse,
        }
    }

    fn result(label: &str, ok: bool, parse: Option<ProbeParse>, parsed: Option<Value>) -> ProbeResult {
        ProbeResult {
            label: label.to_string(),
            argv: vec![],
            exit_code: if ok { 0 } else { 1 },
            timed_out: false,
            ok,
            parse,
            parsed,
            stdout: String::new(),
            stderr: String::new(),
            error: None,
        }
    }

    #[test]
    fn installed_version_prefers_semver_then_first_token() {
        assert_eq!(parse_installed_version("codex-cli 0.74.0"), Some("0.74.0".to_string()));
        assert_eq!(parse_installed_version("nightly build"), Some("nightly".to_string()));
        assert_eq!(parse_installed_version(""), None);
    }

    #[test]
    fn installed_version_runs_with_ten_second_timeout() {
        let runner = Scripted::new(completed(0, "2.0.14 (Claude Code)"));
        let argv = vec!["claude".to_string(), "--version".to_string()];
        let installed = installed_version(Some(argv.as_slice()), &runner);
        assert_eq!(installed.parsed_version.as_deref(), Some("2.0.14"));
        assert_eq!(runner.calls.borrow()[0].1, INSTALLED_VERSION_TIMEOUT);
    }

    #[test]
    fn missing_command_is_exit_127() {
        let runner = Scripted::new(completed(0, "1.0.0"));
        let installed = installed_version(None, &runner);
        assert_eq!(installed.exit_code, EXIT_NOT_FOUND);
        assert!(runner.calls.borrow().is_empty());

        let not_found = ProbeOutcome::SpawnFailed {
            not_found: true,
            message: "Command not found: x".to_string(),
        };
        assert_eq!(not_found.exit_code(), EXIT_NOT_FOUND);
    }

    #[test]
    fn timeout_is_a_failed_probe() {
        let runner = Scripted::new(ProbeOutcome::TimedOut {
            after: Duration::from_secs(5),
        });
        let result = run_probe(&spec(None), &runner);
        assert!(!result.ok);
        assert!(result.timed_out);
        assert_eq!(result.exit_code, EXIT_TIMED_OUT);
        assert_eq!(result.stderr, "Timed out after 5s");
    }

    #[test]
    fn parse_rules_gate_success() {
        let ok_json = Scripted::new(completed(0, r#"{"ok": false}"#));
        assert!(!run_probe(&spec(Some(ProbeParse::OkJson)), &ok_json).ok);

        let object = Scripted::new(completed(0, r#"{"status": "fine"}"#));
        assert!(run_probe(&spec(Some(ProbeParse::JsonObject)), &object).ok);
        assert!(!run_probe(&spec(Some(ProbeParse::OkJson)), &object).ok);

        let lines = Scripted::new(completed(0, "a\nb"));
        let result = run_probe(&spec(Some(ProbeParse::Lines)), &lines);
        assert!(result.ok);
        assert_eq!(result.parsed, Some(serde_json::json!({"lines": ["a", "b"]})));

        let failed = Scripted::new(completed(2, r#"{"ok": true}"#));
        assert!(!run_probe(&spec(Some(ProbeParse::OkJson)), &failed).ok);
    }

    #[test]
    fn empty_argv_is_invalid() {
        let runner = Scripted::new(completed(0, ""));
        let mut invalid = spec(None);
        invalid.argv.clear();
        let result = run_probe(&invalid, &runner);
        assert_eq!(result.error.as_deref(), Some("invalid_probe_argv"));
        assert!(!result.ok);
    }

    #[test]
    fn legacy_parse_names_are_accepted() {
        let parse: ProbeParse = serde_json::from_str(r#""claude_status_json""#).expect("alias");
        assert_eq!(parse, ProbeParse::StatusJson);
    }

    #[test]
    fn degraded_needs_a_status_signal_and_another_failure() {
        let degraded = result(
            "status",
            false,
            Some(ProbeParse::StatusJson),
            Some(serde_json::json!({"ok": false, "indicator": "major", "incidents_count": 0})),
        );
        let usage_failed = result("usage", false, Some(ProbeParse::OkJson), None);
        let usage_ok = result("usage", true, Some(ProbeParse::OkJson), None);

        assert!(upstream_degraded(&[degraded.clone(), usage_failed]));
        assert!(!upstream_degraded(&[degraded.clone(), usage_ok]));
        assert!(!upstream_degraded(&[degraded]));

        let incidents = result(
            "status",
            true,
            Some(ProbeParse::StatusJson),
            Some(serde_json::json!({"ok": true, "indicator": "none", "incidents_count": 2})),
        );
        let other = result("usage", false, None, None);
        assert!(upstream_degraded(&[other, incidents]));
    }

    #[cfg(unix)]
    #[test]
    fn process_runner_reports_missing_binaries() {
        let runner = ProcessRunner::new().expect("runtime");
        let outcome = runner.run(
            &["driftwatch-definitely-not-installed".to_string()],
            Duration::from_secs(5),
        );
        assert_eq!(outcome.exit_code(), EXIT_NOT_FOUND);
    }
}
