use crate::support::{fail, join_or_none, parse_family_or_exit, print_json_or_exit, yes_no};
use driftwatch_evidence::{ScanBudget, build_baseline, capabilities, extract_with_kind};
use driftwatch_kernel::{Fingerprint, diff};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Exit status when observed logs drifted from the baseline.
pub const DRIFT_EXIT_CODE: i32 = 2;

pub fn run(family: String, observed: Vec<String>, baseline: Vec<String>, json_output: bool) {
    let family = parse_family_or_exit(&family);
    let kind = capabilities(family).layout.default_scan_kind();

    let mut observed_fp = Fingerprint::default();
    for raw in &observed {
        let path = Path::new(raw);
        if !path.is_file() {
            fail(format!("not a file: {raw}"));
        }
        let extraction = extract_with_kind(family, kind, path, ScanBudget::for_kind(kind));
        observed_fp = observed_fp.merge(&extraction.fingerprint());
    }

    let baseline = build_baseline(family, &baseline, Path::new(""));
    if baseline.is_empty() {
        fail("baseline is empty: no usable fixture files");
    }
    let schema_diff = diff(&observed_fp, &baseline.fingerprint);

    if json_output {
        print_json_or_exit(&json!({
            "family": family,
            "observed_digest": observed_fp.digest(),
            "baseline_digest": baseline.fingerprint.digest(),
            "baseline_fixtures": baseline.fixtures,
            "baseline_missing": baseline.missing,
            "diff": schema_diff,
        }));
    } else {
        println!("driftwatch schema-diff --family {family}");
        println!("  Baseline fixtures: {}", join_or_none(&baseline.fixtures));
        if !baseline.missing.is_empty() {
            println!("  Missing fixtures: {}", join_or_none(&baseline.missing));
        }
        println!("  Drift: {}", yes_no(schema_diff.drift));
        print_set("Unknown types", &schema_diff.unknown_types);
        print_set("Missing types", &schema_diff.missing_types);
        print_keys("Unknown keys", &schema_diff.unknown_keys);
        print_keys("Missing keys", &schema_diff.missing_keys);
    }

    if schema_diff.drift {
        std::process::exit(DRIFT_EXIT_CODE);
    }
}

fn print_set(header: &str, items: &BTreeSet<String>) {
    if !items.is_empty() {
        println!("  {header}: {}", join_or_none(items));
    }
}

fn print_keys(header: &str, keys: &BTreeMap<String, BTreeSet<String>>) {
    if keys.is_empty() {
        return;
    }
    println!("  {header}:");
    for (logical_type, names) in keys {
        println!("    - {logical_type}: {}", join_or_none(names));
    }
}
