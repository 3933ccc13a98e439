use crate::support::{fail, print_json_or_exit};
use driftwatch_catalog::{
    CatalogLimits, CatalogRequest, DiscoveryRoots, build_catalog, render_markdown,
};
use driftwatch_evidence::expand_path;
use driftwatch_watch::{FsReportSink, ReportSink};
use serde_json::json;
use std::path::PathBuf;

pub struct Args {
    pub fixtures: Option<String>,
    pub fixtures_only: bool,
    pub home: Option<String>,
    pub max_files_per_family: usize,
    pub max_examples_per_group: usize,
    pub max_examples_per_shape: usize,
    pub output_catalog: String,
    pub output_report: String,
    pub sanity_check: bool,
    pub json: bool,
}

fn discovery_roots(args: &Args) -> Option<DiscoveryRoots> {
    if args.fixtures_only {
        return None;
    }
    if let Some(home) = &args.home {
        return Some(DiscoveryRoots::new(expand_path(home)));
    }
    let roots = DiscoveryRoots::from_env();
    if roots.is_none() {
        tracing::warn!("HOME is not set; live session discovery skipped");
    }
    roots
}

pub fn run(args: Args) {
    if args.fixtures_only && args.fixtures.is_none() {
        fail("--fixtures-only requires --fixtures");
    }
    let request = CatalogRequest {
        discovery: discovery_roots(&args),
        fixtures_root: args.fixtures.as_deref().map(expand_path),
        limits: CatalogLimits {
            max_examples_per_group: args.max_examples_per_group,
            max_examples_per_shape: args.max_examples_per_shape,
            max_files_per_family: args.max_files_per_family,
            ..CatalogLimits::default()
        },
    };

    let catalog = build_catalog(&request).unwrap_or_else(|e| fail(e));
    let markdown = render_markdown(&catalog);
    let (catalog_path, report_path) = FsReportSink::in_dir(".")
        .with_catalog_paths(
            PathBuf::from(&args.output_catalog),
            PathBuf::from(&args.output_report),
        )
        .write_catalog(&catalog, &markdown)
        .unwrap_or_else(|e| fail(e));

    if args.json {
        print_json_or_exit(&json!({
            "catalog_path": catalog_path.display().to_string(),
            "report_path": report_path.display().to_string(),
            "files_scanned": catalog.files_scanned,
            "summary": catalog.summary,
            "group_count": catalog.groups.len(),
        }));
    } else {
        println!("driftwatch catalog");
        println!("  Catalog: {}", catalog_path.display());
        println!("  Report: {}", report_path.display());
        println!("  Tool blocks: {}", catalog.total_tool_blocks());
        for (family, count) in &catalog.summary.family_counts {
            println!("    - {family}: {count}");
        }
        println!("  Groups: {}", catalog.groups.len());
        println!("  Shapes: {}", catalog.shape_signatures.len());
    }

    // Outputs are written even when the check fails.
    if args.sanity_check {
        catalog.sanity_check().unwrap_or_else(|e| fail(e));
    }
}
