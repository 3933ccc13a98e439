pub mod catalog;
pub mod decide;
pub mod fingerprint;
pub mod schema_diff;
pub mod watch;
