//! Baseline diff: set algebra over two fingerprints' key maps.
//!
//! Only *new* things are drift. A producer that stops emitting an optional
//! field or record type shows up under `missing_*` and nothing else; one that
//! starts emitting a field or type the baseline never saw sets `drift`.
//! Matching is exact (case-sensitive string equality).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::fingerprint::{Fingerprint, TypeKeys};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDiff {
    pub unknown_types: BTreeSet<String>,
    pub missing_types: BTreeSet<String>,
    pub unknown_keys: BTreeMap<String, BTreeSet<String>>,
    pub missing_keys: BTreeMap<String, BTreeSet<String>>,
    pub drift: bool,
}

impl SchemaDiff {
    /// Diff an observed key map against a baseline key map.
    pub fn between(observed: &TypeKeys, baseline: &TypeKeys) -> Self {
        let observed_types: BTreeSet<&String> = observed.keys().collect();
        let baseline_types: BTreeSet<&String> = baseline.keys().collect();

        let unknown_types: BTreeSet<String> = observed_types
            .difference(&baseline_types)
            .map(|t| (*t).clone())
            .collect();
        let missing_types: BTreeSet<String> = baseline_types
            .difference(&observed_types)
            .map(|t| (*t).clone())
            .collect();

        let empty = BTreeSet::new();
        let mut unknown_keys = BTreeMap::new();
        let mut missing_keys = BTreeMap::new();
        for logical_type in observed_types.union(&baseline_types) {
            let seen = observed.get(*logical_type).unwrap_or(&empty);
            let known = baseline.get(*logical_type).unwrap_or(&empty);

            let extra: BTreeSet<String> = seen.difference(known).cloned().collect();
            let gone: BTreeSet<String> = known.difference(seen).cloned().collect();
            if !extra.is_empty() {
                unknown_keys.insert((*logical_type).clone(), extra);
            }
            if !gone.is_empty() {
                missing_keys.insert((*logical_type).clone(), gone);
            }
        }

        let drift = !unknown_types.is_empty() || !unknown_keys.is_empty();
        Self {
            unknown_types,
            missing_types,
            unknown_keys,
            missing_keys,
            drift,
        }
    }

    /// True when nothing differs in either direction.
    pub fn is_empty(&self) -> bool {
        self.unknown_types.is_empty()
            && self.missing_types.is_empty()
            && self.unknown_keys.is_empty()
            && self.missing_keys.is_empty()
    }
}

/// Diff an observed fingerprint against a baseline fingerprint.
pub fn diff(observed: &Fingerprint, baseline: &Fingerprint) -> SchemaDiff {
    SchemaDiff::between(&observed.type_keys, &baseline.type_keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(entries: &[(&str, &[&str])]) -> TypeKeys {
        entries
            .iter()
            .map(|(t, fields)| {
                (
                    t.to_string(),
                    fields.iter().map(|f| f.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn diff_with_self_is_empty() {
        let fp = Fingerprint::from_type_keys(keys(&[
            ("message.user", &["role", "content"]),
            ("session", &["id", "title"]),
        ]));
        let d = diff(&fp, &fp);
        assert!(!d.drift);
        assert!(d.is_empty());
    }

    #[test]
    fn new_field_is_drift() {
        let baseline = Fingerprint::from_type_keys(keys(&[("message.user", &["role", "content"])]));
        let observed = Fingerprint::from_type_keys(keys(&[(
            "message.user",
            &["role", "content", "attachments"],
        )]));
        let d = diff(&observed, &baseline);
        assert!(d.drift);
        assert_eq!(
            d.unknown_keys["message.user"].iter().collect::<Vec<_>>(),
            vec!["attachments"]
        );
        assert!(d.missing_keys.is_empty());
    }

    #[test]
    fn removed_field_and_type_are_not_drift() {
        let baseline = Fingerprint::from_type_keys(keys(&[
            ("message", &["role", "text", "model"]),
            ("completion", &["finalText"]),
        ]));
        let observed = Fingerprint::from_type_keys(keys(&[("message", &["role", "text"])]));
        let d = diff(&observed, &baseline);
        assert!(!d.drift);
        assert_eq!(d.missing_types.iter().collect::<Vec<_>>(), vec!["completion"]);
        assert_eq!(d.missing_keys["message"].iter().collect::<Vec<_>>(), vec!["model"]);
        // a type missing entirely also lists all of its keys as missing
        assert_eq!(
            d.missing_keys["completion"].iter().collect::<Vec<_>>(),
            vec!["finalText"]
        );
    }

    #[test]
    fn unknown_and_missing_types_swap_when_sides_swap() {
        let a = Fingerprint::from_type_keys(keys(&[("a", &["x"]), ("b", &["y"])]));
        let b = Fingerprint::from_type_keys(keys(&[("b", &["y"]), ("c", &["z"])]));
        assert_eq!(diff(&a, &b).unknown_types, diff(&b, &a).missing_types);
        assert_eq!(diff(&a, &b).unknown_keys, diff(&b, &a).missing_keys);
    }

    #[test]
    fn key_matching_is_case_sensitive() {
        let baseline = Fingerprint::from_type_keys(keys(&[("message", &["sessionId"])]));
        let observed = Fingerprint::from_type_keys(keys(&[("message", &["sessionID"])]));
        assert!(diff(&observed, &baseline).drift);
    }

    #[test]
    fn diff_serializes_in_stable_order() {
        let baseline = Fingerprint::from_type_keys(keys(&[
            ("message.user", &["role", "content", "timestamp"]),
            ("session", &["id"]),
        ]));
        let observed = Fingerprint::from_type_keys(keys(&[
            ("message.user", &["role", "content", "attachments"]),
            ("part.patch", &["hash"]),
        ]));
        insta::assert_json_snapshot!(diff(&observed, &baseline), @r###"
        {
          "unknown_types": [
            "part.patch"
          ],
          "missing_types": [
            "session"
          ],
          "unknown_keys": {
            "message.user": [
              "attachments"
            ],
            "part.patch": [
              "hash"
            ]
          },
          "missing_keys": {
            "message.user": [
              "timestamp"
            ],
            "session": [
              "id"
            ]
          },
          "drift": true
        }
        "###);
    }
}
