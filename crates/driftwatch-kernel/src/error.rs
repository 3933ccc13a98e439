//! Error types for kernel value parsing.

/// Errors from parsing kernel enums out of user or config text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KernelError {
    /// The name does not match any supported producer family.
    #[error("unknown producer family: {0}")]
    UnknownProducerFamily(String),

    /// The name does not match `daily` or `weekly`.
    #[error("unknown evaluation mode: {0}")]
    UnknownEvaluationMode(String),
}
