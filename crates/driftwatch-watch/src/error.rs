use std::path::PathBuf;

/// Conditions that abort a whole watch run.
///
/// Everything that can go wrong for a single producer (unreachable
/// upstream, failed probe, unreadable session file) is reported in that
/// producer's result instead.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("{}: invalid configuration: {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error("{}: failed to write report: {message}", path.display())]
    Sink { path: PathBuf, message: String },

    #[error("failed to start process runtime: {0}")]
    Runtime(String),
}

impl WatchError {
    pub(crate) fn config(path: &std::path::Path, message: impl std::fmt::Display) -> Self {
        Self::Config {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }

    pub(crate) fn sink(path: &std::path::Path, message: impl std::fmt::Display) -> Self {
        Self::Sink {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }
}
