//! JSONL streams: one JSON object per line.
//!
//! Reads are lossy. Invalid UTF-8 is replaced, blank lines are skipped,
//! lines that are not JSON count as parse errors, and JSON values that are
//! not objects are ignored.

use driftwatch_kernel::{ProducerFamily, RawRef, Record, infer_logical_type};
use serde_json::Value;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::ExtractionWarning;
use crate::extract::Extraction;

/// Non-blank lines of `reader`, keeping only the last `max_lines`.
/// Each line carries its 1-based line number.
pub fn tail_lines(reader: impl BufRead, max_lines: usize) -> Vec<(usize, String)> {
    let mut window: VecDeque<(usize, String)> = VecDeque::with_capacity(max_lines.min(4096));
    if max_lines == 0 {
        return Vec::new();
    }
    for (line_no, line) in lossy_lines(reader) {
        if line.trim().is_empty() {
            continue;
        }
        if window.len() == max_lines {
            window.pop_front();
        }
        window.push_back((line_no, line));
    }
    window.into_iter().collect()
}

fn lossy_lines(mut reader: impl BufRead) -> impl Iterator<Item = (usize, String)> {
    let mut line_no = 0usize;
    std::iter::from_fn(move || {
        let mut buf = Vec::new();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) | Err(_) => None,
            Ok(_) => {
                line_no += 1;
                Some((line_no, String::from_utf8_lossy(&buf).into_owned()))
            }
        }
    })
}

/// Records from the last `max_lines` non-blank lines of a JSONL file.
pub fn extract_jsonl(family: ProducerFamily, path: &Path, max_lines: usize) -> Extraction {
    let mut extraction = Extraction::new(family, path);
    let file = match File::open(path) {
        Ok(file) => file,
        Err(error) => {
            tracing::warn!(path = %path.display(), %error, "cannot open jsonl evidence");
            extraction.parse_errors = 1;
            extraction.warning = Some(ExtractionWarning::SourceUnreadable);
            return extraction;
        }
    };

    for (line_no, line) in tail_lines(BufReader::new(file), max_lines) {
        match serde_json::from_str::<Value>(line.trim()) {
            Ok(Value::Object(obj)) => extraction.records.push(Record::from_object(
                family,
                &obj,
                RawRef::new(path, Some(line_no)),
            )),
            Ok(_) => {}
            Err(_) => extraction.parse_errors += 1,
        }
    }
    extraction
}

/// Whether any of the first `max_lines` lines has a `type` in `types`.
pub fn jsonl_contains_any_type(path: &Path, types: &[String], max_lines: usize) -> bool {
    let Ok(file) = File::open(path) else {
        return false;
    };
    lossy_lines(BufReader::new(file))
        .take(max_lines)
        .filter_map(|(_, line)| serde_json::from_str::<Value>(line.trim()).ok())
        .filter_map(|value| match value {
            Value::Object(obj) => Some(infer_logical_type(&obj)),
            _ => None,
        })
        .any(|logical_type| types.iter().any(|wanted| *wanted == logical_type))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_keeps_last_non_blank_lines() {
        let input = "a\n\n  \nb\nc\nd\n";
        let lines = tail_lines(input.as_bytes(), 2);
        assert_eq!(
            lines,
            vec![(5, "c\n".to_string()), (6, "d\n".to_string())]
        );
    }

    #[test]
    fn tail_of_zero_is_empty() {
        assert!(tail_lines("a\nb\n".as_bytes(), 0).is_empty());
    }

    #[test]
    fn invalid_utf8_is_replaced_not_dropped() {
        let input: &[u8] = b"{\"type\":\"x\xff\"}\n";
        let lines = tail_lines(input, 10);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].1.contains('\u{fffd}'));
    }
}
