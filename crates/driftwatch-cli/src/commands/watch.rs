use crate::support::{fail, parse_mode_or_exit, print_json_or_exit};
use driftwatch_evidence::expand_path;
use driftwatch_kernel::EvaluationMode;
use driftwatch_watch::{
    FsReportSink, HttpFetcher, ProcessRunner, ReportSink, SupportMatrix, WatchConfig, WatchRunner,
    run_dir,
};
use std::path::Path;
use std::time::Duration;

/// Most summary lines printed; the report keeps all of them.
const SUMMARY_LINE_LIMIT: usize = 40;

pub struct Args {
    pub mode: String,
    pub config: String,
    pub matrix: String,
    pub timeout: u64,
    pub report_root: Option<String>,
    pub json: bool,
}

pub fn run(args: Args) {
    let mode = parse_mode_or_exit(&args.mode);
    let config = WatchConfig::load(Path::new(&args.config)).unwrap_or_else(|e| fail(e));
    let matrix = SupportMatrix::load(Path::new(&args.matrix)).unwrap_or_else(|e| fail(e));
    let report_root = args
        .report_root
        .as_deref()
        .map(expand_path)
        .unwrap_or_else(|| config.report_root());

    let now = chrono::Utc::now();
    let report_dir = run_dir(&report_root, now);
    let http = HttpFetcher::new(Duration::from_secs(args.timeout));
    let runner = ProcessRunner::new().unwrap_or_else(|e| fail(e));

    tracing::info!(%mode, config = %args.config, "starting watch run");
    let report = WatchRunner::new(&config, &matrix, &http, &runner).run(
        mode,
        &args.config,
        &report_dir,
        now,
    );
    let report_path = FsReportSink::in_dir(&report_dir)
        .write_report(&report)
        .unwrap_or_else(|e| fail(e));

    if args.json {
        print_json_or_exit(&report);
        return;
    }

    // A quiet daily pass prints nothing.
    if mode == EvaluationMode::Weekly || report.any_actionable {
        println!("Agent watch ({mode}) report: {}", report_path.display());
        for line in report.summary_lines.iter().take(SUMMARY_LINE_LIMIT) {
            println!("{line}");
        }
    }
}
