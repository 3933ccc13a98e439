//! Linked-tree sessions: separate session, message and part files.
//!
//! ```text
//! <storage>/session/<project>/ses_*.json     session record, holds `id`
//! <storage>/message/<session id>/msg_*.json  messages, each holds `id`
//! <storage>/part/<message id>/*.json         parts
//! ```

use driftwatch_kernel::{ProducerFamily, RawRef, Record, prefixed_type};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::error::ExtractionWarning;
use crate::extract::Extraction;

const SESSION_DIR: &str = "session";
const MESSAGE_DIR: &str = "message";
const PART_DIR: &str = "part";

/// Nearest ancestor holding all three of `session/`, `message/`, `part/`.
pub fn storage_root_for(session_path: &Path) -> Option<PathBuf> {
    session_path
        .ancestors()
        .skip(1)
        .find(|dir| {
            dir.join(SESSION_DIR).is_dir()
                && dir.join(MESSAGE_DIR).is_dir()
                && dir.join(PART_DIR).is_dir()
        })
        .map(Path::to_path_buf)
}

enum Parsed {
    Object(Map<String, Value>),
    NotObject,
    Invalid,
}

fn read_object(path: &Path) -> Parsed {
    let Ok(bytes) = std::fs::read(path) else {
        return Parsed::Invalid;
    };
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(obj)) => Parsed::Object(obj),
        Ok(_) => Parsed::NotObject,
        Err(_) => Parsed::Invalid,
    }
}

fn sorted_json_files(dir: &Path, prefix: &str) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(prefix) && name.ends_with(".json"))
        })
        .collect();
    files.sort();
    files
}

/// Walk one session: the session record, up to `max_messages` messages in
/// file-name order, and up to `max_parts` part files shared across all
/// messages. Unparsable part files still consume the part budget.
pub fn extract_storage_tree(
    family: ProducerFamily,
    session_path: &Path,
    max_messages: usize,
    max_parts: usize,
) -> Extraction {
    let mut extraction = Extraction::new(family, session_path);

    let session = match read_object(session_path) {
        Parsed::Object(obj) => obj,
        Parsed::NotObject => {
            extraction.warning = Some(ExtractionWarning::SessionIdMissing);
            return extraction;
        }
        Parsed::Invalid => {
            extraction.parse_errors = 1;
            return extraction;
        }
    };
    extraction.records.push(Record::with_type(
        family,
        "session",
        &session,
        RawRef::new(session_path, None),
    ));

    let Some(session_id) = session.get("id").and_then(Value::as_str).filter(|id| !id.is_empty())
    else {
        extraction.warning = Some(ExtractionWarning::SessionIdMissing);
        return extraction;
    };
    let Some(storage_root) = storage_root_for(session_path) else {
        extraction.warning = Some(ExtractionWarning::StorageRootNotFound);
        return extraction;
    };
    let message_dir = storage_root.join(MESSAGE_DIR).join(session_id);
    if !message_dir.is_dir() {
        extraction.warning = Some(ExtractionWarning::MessageDirNotFound);
        return extraction;
    }

    let mut part_budget = max_parts;
    for message_path in sorted_json_files(&message_dir, "msg_")
        .into_iter()
        .take(max_messages)
    {
        let message = match read_object(&message_path) {
            Parsed::Object(obj) => obj,
            Parsed::NotObject => continue,
            Parsed::Invalid => {
                extraction.parse_errors += 1;
                continue;
            }
        };
        extraction.records.push(Record::with_type(
            family,
            prefixed_type("message", &message, "role"),
            &message,
            RawRef::new(&message_path, None),
        ));
        extraction.message_files_parsed += 1;

        let Some(message_id) = message.get("id").and_then(Value::as_str).filter(|id| !id.is_empty())
        else {
            continue;
        };
        let part_dir = storage_root.join(PART_DIR).join(message_id);
        for part_path in sorted_json_files(&part_dir, "") {
            if part_budget == 0 {
                break;
            }
            part_budget -= 1;
            match read_object(&part_path) {
                Parsed::Object(part) => {
                    extraction.records.push(Record::with_type(
                        family,
                        prefixed_type("part", &part, "type"),
                        &part,
                        RawRef::new(&part_path, None),
                    ));
                    extraction.part_files_parsed += 1;
                }
                Parsed::NotObject => {}
                Parsed::Invalid => extraction.parse_errors += 1,
            }
        }
    }
    extraction
}

/// One loose file from a linked-tree fixture set, typed by the nearest
/// `session`/`message`/`part` directory in its path.
pub fn extract_tree_fixture_file(family: ProducerFamily, path: &Path) -> Extraction {
    let mut extraction = Extraction::new(family, path);
    let obj = match read_object(path) {
        Parsed::Object(obj) => obj,
        Parsed::NotObject => return extraction,
        Parsed::Invalid => {
            extraction.parse_errors = 1;
            return extraction;
        }
    };

    let kind = path
        .parent()
        .into_iter()
        .flat_map(Path::ancestors)
        .filter_map(|dir| dir.file_name().and_then(|name| name.to_str()))
        .find(|name| matches!(*name, SESSION_DIR | MESSAGE_DIR | PART_DIR));
    let logical_type = match kind {
        Some(SESSION_DIR) => SESSION_DIR.to_string(),
        Some(MESSAGE_DIR) => prefixed_type(MESSAGE_DIR, &obj, "role"),
        Some(PART_DIR) => prefixed_type(PART_DIR, &obj, "type"),
        _ => format!("{family}_json"),
    };
    extraction
        .records
        .push(Record::with_type(family, logical_type, &obj, RawRef::new(path, None)));
    extraction
}
