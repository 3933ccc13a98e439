//! Schema fingerprints: `{logical type -> field names}` plus counts.
//!
//! A fingerprint is a fold over records. Key sets merge by union, so
//! re-ingesting a record never changes `type_keys`, and merging two
//! fingerprints gives the same key sets in either order. All maps are
//! `BTreeMap`/`BTreeSet`; serialized output is lexicographically ordered.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

use crate::record::Record;

/// Field names observed per logical type.
pub type TypeKeys = BTreeMap<String, BTreeSet<String>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub type_keys: TypeKeys,
    pub type_counts: BTreeMap<String, u64>,
    pub parsed_count: u64,
    pub parse_errors: u64,
}

impl Fingerprint {
    /// Fold a record stream into a fingerprint.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a Record>) -> Self {
        let mut builder = FingerprintBuilder::default();
        for record in records {
            builder.push(record);
        }
        builder.finish()
    }

    /// Fingerprint with only a key map, e.g. a baseline loaded from a report.
    pub fn from_type_keys(type_keys: TypeKeys) -> Self {
        Self {
            type_keys,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.type_keys.is_empty()
    }

    /// Union of key sets, sum of counts.
    pub fn merge(&self, other: &Fingerprint) -> Fingerprint {
        let mut merged = self.clone();
        for (logical_type, keys) in &other.type_keys {
            merged
                .type_keys
                .entry(logical_type.clone())
                .or_default()
                .extend(keys.iter().cloned());
        }
        for (logical_type, count) in &other.type_counts {
            *merged.type_counts.entry(logical_type.clone()).or_insert(0) += count;
        }
        merged.parsed_count += other.parsed_count;
        merged.parse_errors += other.parse_errors;
        merged
    }

    /// Content digest of the key map only. Counts do not affect it.
    pub fn digest(&self) -> String {
        let canonical =
            serde_json::to_vec(&self.type_keys).unwrap_or_else(|_| b"{}".to_vec());
        let hash = Sha256::digest(&canonical);
        let hex: String = hash.iter().map(|byte| format!("{byte:02x}")).collect();
        format!("sha256:{hex}")
    }
}

/// Accumulator behind [`Fingerprint::from_records`]. Extractors use it
/// directly so they can also count parse errors.
#[derive(Debug, Default)]
pub struct FingerprintBuilder {
    inner: Fingerprint,
}

impl FingerprintBuilder {
    pub fn push(&mut self, record: &Record) {
        let logical_type = record.logical_type().to_string();
        self.inner
            .type_keys
            .entry(logical_type.clone())
            .or_default()
            .extend(record.fields().iter().cloned());
        *self.inner.type_counts.entry(logical_type).or_insert(0) += 1;
        self.inner.parsed_count += 1;
    }

    pub fn note_parse_error(&mut self) {
        self.inner.parse_errors += 1;
    }

    pub fn add_parse_errors(&mut self, count: u64) {
        self.inner.parse_errors += count;
    }

    pub fn finish(self) -> Fingerprint {
        self.inner
    }
}
