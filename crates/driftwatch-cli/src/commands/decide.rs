use crate::support::{parse_mode_or_exit, print_json_or_exit, yes_no};
use driftwatch_kernel::{SeveritySignals, evaluate};
use serde_json::json;

pub struct Args {
    pub monitoring_failed: bool,
    pub probe_failed: bool,
    pub upstream_degraded: bool,
    pub upstream_newer: bool,
    pub installed_newer: bool,
    pub keyword_hits: bool,
    pub mode: String,
    pub schema_drift: Option<bool>,
    pub json: bool,
}

pub fn run(args: Args) {
    let mode = parse_mode_or_exit(&args.mode);
    let signals = SeveritySignals {
        monitoring_failed: args.monitoring_failed,
        probe_failed: args.probe_failed,
        probe_failed_but_upstream_degraded: args.upstream_degraded,
        upstream_newer_than_verified: args.upstream_newer,
        installed_newer_than_verified: args.installed_newer,
        schema_or_usage_keyword_hits: args.keyword_hits,
    };
    let decision = evaluate(&signals, mode, args.schema_drift);
    let actionable = decision.is_actionable(mode);

    if args.json {
        print_json_or_exit(&json!({
            "mode": mode,
            "signals": signals,
            "schema_drift": args.schema_drift,
            "severity": decision.severity,
            "recommendation": decision.recommendation,
            "rule": decision.rule,
            "actionable": actionable,
        }));
    } else {
        println!("driftwatch decide --mode {mode}");
        println!("  Severity: {}", decision.severity);
        println!("  Recommendation: {}", decision.recommendation);
        println!("  Rule: {}", decision.rule);
        println!("  Actionable: {}", yes_no(actionable));
    }
}
