use crate::support::{
    fail, join_or_none, parse_family_or_exit, parse_kind_or_exit, print_json_or_exit,
};
use driftwatch_evidence::{ScanBudget, capabilities, extract_with_kind};
use driftwatch_kernel::Fingerprint;
use serde_json::json;
use std::path::Path;

pub struct Args {
    pub family: String,
    pub kind: Option<String>,
    pub paths: Vec<String>,
    pub max_lines: Option<usize>,
    pub max_messages: Option<usize>,
    pub max_parts: Option<usize>,
    pub json: bool,
}

pub fn run(args: Args) {
    let family = parse_family_or_exit(&args.family);
    let kind = args
        .kind
        .as_deref()
        .map(parse_kind_or_exit)
        .unwrap_or_else(|| capabilities(family).layout.default_scan_kind());
    let defaults = ScanBudget::for_kind(kind);
    let budget = ScanBudget {
        max_lines: args.max_lines.unwrap_or(defaults.max_lines),
        max_messages: args.max_messages.unwrap_or(defaults.max_messages),
        max_parts: args.max_parts.unwrap_or(defaults.max_parts),
    };

    let mut files = Vec::new();
    let mut merged = Fingerprint::default();
    for raw in &args.paths {
        let path = Path::new(raw);
        if !path.is_file() {
            fail(format!("not a file: {raw}"));
        }
        let extraction = extract_with_kind(family, kind, path, budget);
        merged = merged.merge(&extraction.fingerprint());
        files.push(extraction.summary());
    }

    if args.json {
        print_json_or_exit(&json!({
            "family": family,
            "kind": kind,
            "files": files,
            "merged": {
                "digest": merged.digest(),
                "fingerprint": merged,
            },
        }));
        return;
    }

    println!("driftwatch fingerprint --family {family} --kind {kind}");
    for file in &files {
        println!("  File: {}", file.file);
        println!("    Digest: {}", file.digest);
        println!(
            "    Parsed: {} (parse errors: {})",
            file.fingerprint.parsed_count, file.fingerprint.parse_errors
        );
        if let Some(warning) = file.warning {
            println!("    Warning: {warning}");
        }
    }
    if files.len() > 1 {
        println!("  Merged digest: {}", merged.digest());
    }
    println!("  Types:");
    for (logical_type, keys) in &merged.type_keys {
        let count = merged.type_counts.get(logical_type).copied().unwrap_or(0);
        println!("    - {logical_type} ({count}): {}", join_or_none(keys));
    }
}
