use driftwatch_evidence::ScanKind;
use driftwatch_kernel::{EvaluationMode, ProducerFamily};
use serde::Serialize;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_ENV: &str = "DRIFTWATCH_LOG";
const DEFAULT_LOG_FILTER: &str = "warn";

/// Logs go to stderr so stdout stays machine-readable.
pub fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

pub fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("error: {message}");
    std::process::exit(1);
}

pub fn parse_family_or_exit(family: &str) -> ProducerFamily {
    family.parse().unwrap_or_else(|e| fail(e))
}

pub fn parse_mode_or_exit(mode: &str) -> EvaluationMode {
    mode.parse().unwrap_or_else(|e| fail(e))
}

pub fn parse_kind_or_exit(kind: &str) -> ScanKind {
    kind.parse().unwrap_or_else(|e| fail(e))
}

pub fn print_json_or_exit<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => fail(format!("failed to render JSON: {e}")),
    }
}

pub fn yes_no(ok: bool) -> &'static str {
    if ok { "yes" } else { "no" }
}

pub fn join_or_none<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined: Vec<String> = items.into_iter().map(|s| s.as_ref().to_string()).collect();
    if joined.is_empty() {
        "(none)".to_string()
    } else {
        joined.join(", ")
    }
}
