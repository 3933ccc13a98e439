//! Driftwatch CLI: the `driftwatch` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    support::init_tracing(cli.log_json);

    match cli.command {
        Commands::Watch {
            mode,
            config,
            matrix,
            timeout,
            report_root,
            json,
        } => commands::watch::run(commands::watch::Args {
            mode,
            config,
            matrix,
            timeout,
            report_root,
            json,
        }),

        Commands::Catalog {
            fixtures,
            fixtures_only,
            home,
            max_files_per_family,
            max_examples_per_group,
            max_examples_per_shape,
            output_catalog,
            output_report,
            sanity_check,
            json,
        } => commands::catalog::run(commands::catalog::Args {
            fixtures,
            fixtures_only,
            home,
            max_files_per_family,
            max_examples_per_group,
            max_examples_per_shape,
            output_catalog,
            output_report,
            sanity_check,
            json,
        }),

        Commands::Fingerprint {
            family,
            kind,
            paths,
            max_lines,
            max_messages,
            max_parts,
            json,
        } => commands::fingerprint::run(commands::fingerprint::Args {
            family,
            kind,
            paths,
            max_lines,
            max_messages,
            max_parts,
            json,
        }),

        Commands::SchemaDiff {
            family,
            observed,
            baseline,
            json,
        } => commands::schema_diff::run(family, observed, baseline, json),

        Commands::Decide {
            monitoring_failed,
            probe_failed,
            upstream_degraded,
            upstream_newer,
            installed_newer,
            keyword_hits,
            mode,
            schema_drift,
            json,
        } => commands::decide::run(commands::decide::Args {
            monitoring_failed,
            probe_failed,
            upstream_degraded,
            upstream_newer,
            installed_newer,
            keyword_hits,
            mode,
            schema_drift,
            json,
        }),
    }
}
