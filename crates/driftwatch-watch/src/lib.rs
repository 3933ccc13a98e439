//! # Driftwatch Watch
//!
//! Scheduled monitoring passes. A daily pass compares upstream and
//! installed versions against the support matrix; a weekly pass also
//! fingerprints the newest local session, diffs it against the baseline
//! fixtures and runs the configured probes.
//!
//! Network and process access go through [`HttpFetch`] and
//! [`CommandRunner`], so a pass can run against fakes.

pub mod config;
pub mod error;
pub mod keywords;
pub mod probe;
pub mod report;
pub mod run;
pub mod upstream;

pub use config::{
    AgentConfig, Cadence, DEFAULT_REPORT_ROOT, MatrixEntry, RiskKeywords, SupportMatrix,
    WatchConfig, WeeklyConfig,
};
pub use error::WatchError;
pub use keywords::{KeywordHits, keyword_hits, scan_upstream};
pub use probe::{
    CommandRunner, EXIT_NOT_FOUND, EXIT_TIMED_OUT, InstalledVersion, ProbeOutcome, ProbeParse,
    ProbeResult, ProbeSpec, ProcessRunner, installed_version, parse_installed_version, run_probe,
    upstream_degraded,
};
pub use report::{
    AgentReport, BaselineReport, CATALOG_JSON_FILE, CATALOG_MARKDOWN_FILE, EvidenceSummary,
    FsReportSink, LocalSchemaReport, REPORT_FILE, ReportSink, Risk, VersionDiff, WatchReport,
    WeeklyDetails, run_dir, write_atomic, write_json_atomic,
};
pub use run::WatchRunner;
pub use upstream::{
    HttpFetch, HttpFetcher, UpstreamFetchError, UpstreamRecord, UpstreamResolution,
    UpstreamSource, fetch_upstream, resolve_upstream,
};
