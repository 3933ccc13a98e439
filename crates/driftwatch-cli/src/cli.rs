use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "driftwatch",
    about = "Driftwatch: schema and version drift monitoring for agent session logs",
    version
)]
pub struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a daily or weekly monitoring pass and write a report
    Watch {
        /// Evaluation mode: daily or weekly
        #[arg(long, default_value = "daily")]
        mode: String,

        /// Watch configuration JSON path
        #[arg(long, default_value = "driftwatch.json")]
        config: String,

        /// Support matrix TOML path
        #[arg(long, default_value = "support_matrix.toml")]
        matrix: String,

        /// HTTP timeout for upstream version sources, in seconds
        #[arg(long, default_value_t = 12)]
        timeout: u64,

        /// Override the configured report root
        #[arg(long)]
        report_root: Option<String>,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Cluster tool calls and results found in session logs by shape
    Catalog {
        /// Fixtures root scanned in addition to live sessions
        #[arg(long)]
        fixtures: Option<String>,

        /// Skip live session discovery
        #[arg(long)]
        fixtures_only: bool,

        /// Home directory used for live session discovery (default: $HOME)
        #[arg(long)]
        home: Option<String>,

        #[arg(long, default_value_t = 200)]
        max_files_per_family: usize,

        #[arg(long, default_value_t = 3)]
        max_examples_per_group: usize,

        #[arg(long, default_value_t = 3)]
        max_examples_per_shape: usize,

        /// Catalog JSON output path
        #[arg(long, default_value = "tool_io_catalog.json")]
        output_catalog: String,

        /// Markdown report output path
        #[arg(long, default_value = "tool_io_report.md")]
        output_report: String,

        /// Fail when no tool blocks were found
        #[arg(long)]
        sanity_check: bool,

        /// Output the catalog summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fingerprint session files
    Fingerprint {
        /// Producer family (codex, claude, copilot, droid, gemini, opencode)
        #[arg(long)]
        family: String,

        /// Scan kind (default: the family's layout)
        #[arg(long)]
        kind: Option<String>,

        /// Session files to fingerprint
        #[arg(required = true)]
        paths: Vec<String>,

        #[arg(long)]
        max_lines: Option<usize>,

        #[arg(long)]
        max_messages: Option<usize>,

        #[arg(long)]
        max_parts: Option<usize>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diff observed session files against baseline fixtures (exit 2 on drift)
    SchemaDiff {
        /// Producer family
        #[arg(long)]
        family: String,

        /// Observed session files
        #[arg(long, num_args = 1.., required = true)]
        observed: Vec<String>,

        /// Baseline fixture files
        #[arg(long, num_args = 1.., required = true)]
        baseline: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Evaluate the severity decision table for one set of signals
    Decide {
        #[arg(long)]
        monitoring_failed: bool,

        #[arg(long)]
        probe_failed: bool,

        /// A status probe reports the external service as degraded
        #[arg(long)]
        upstream_degraded: bool,

        #[arg(long)]
        upstream_newer: bool,

        #[arg(long)]
        installed_newer: bool,

        #[arg(long)]
        keyword_hits: bool,

        /// Evaluation mode: daily or weekly
        #[arg(long, default_value = "daily")]
        mode: String,

        /// Result of a live schema comparison, if one ran
        #[arg(long)]
        schema_drift: Option<bool>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
