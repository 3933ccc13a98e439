//! Single-document sessions: a root object with a `messages` array.

use driftwatch_kernel::{ProducerFamily, RawRef, Record};
use serde_json::Value;
use std::path::Path;

use crate::error::ExtractionWarning;
use crate::extract::Extraction;

/// Logical type of the session root object.
pub const ROOT_TYPE: &str = "root";

/// A `root` record for the top-level object plus one record per
/// `messages[]` item, at most `max_messages` of them. A top-level array is
/// treated as the message list with no root record.
///
/// An unreadable or unparsable document yields one parse error and no records.
pub fn extract_session_json(
    family: ProducerFamily,
    path: &Path,
    max_messages: usize,
) -> Extraction {
    let mut extraction = Extraction::new(family, path);
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::warn!(path = %path.display(), %error, "cannot read session evidence");
            extraction.parse_errors = 1;
            extraction.warning = Some(ExtractionWarning::SourceUnreadable);
            return extraction;
        }
    };
    let document = match serde_json::from_slice::<Value>(&bytes) {
        Ok(document) => document,
        Err(_) => {
            extraction.parse_errors = 1;
            return extraction;
        }
    };

    let messages = match &document {
        Value::Object(root) => {
            extraction
                .records
                .push(Record::with_type(family, ROOT_TYPE, root, RawRef::new(path, None)));
            match root.get("messages") {
                Some(Value::Array(messages)) => messages.as_slice(),
                _ => &[],
            }
        }
        Value::Array(items) => items.as_slice(),
        _ => &[],
    };
    for (index, message) in messages.iter().take(max_messages).enumerate() {
        if let Value::Object(obj) = message {
            extraction
                .records
                .push(Record::from_object(family, obj, RawRef::new(path, Some(index))));
        }
    }
    extraction
}
