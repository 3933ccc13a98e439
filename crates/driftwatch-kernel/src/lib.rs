//! # Driftwatch Kernel
//!
//! Pure algorithms over irregular agent-log records: nothing here touches
//! the filesystem, the network, or a process table.
//!
//! ## Architecture
//!
//! ```text
//! Record             <- one logical object: family, logical type, field names
//!     |
//! Fingerprint        <- {logical type -> field names} + counts, folded from records
//!     |
//! SchemaDiff         <- observed vs baseline; drift iff something new appears
//!     |
//! SeverityDecision   <- ordered rule table over version/probe/keyword signals,
//!                       then the deep-mode compatibility override
//! ```

pub mod diff;
pub mod error;
pub mod fingerprint;
pub mod record;
pub mod semver;
pub mod severity;

pub use diff::{SchemaDiff, diff};
pub use error::KernelError;
pub use fingerprint::{Fingerprint, FingerprintBuilder, TypeKeys};
pub use record::{
    MISSING_TYPE, ProducerFamily, RawRef, Record, discriminator, infer_logical_type,
    prefixed_type,
};
pub use semver::{Semver, compare_versions, extract_semver, is_newer};
pub use severity::{
    DecisionRule, EvaluationMode, Recommendation, Severity, SeverityDecision, SeveritySignals,
    apply_compatibility_override, decide, evaluate,
};
