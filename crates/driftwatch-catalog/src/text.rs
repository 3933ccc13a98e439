//! Tool calls rendered into free text as a tool name followed by JSON.
//!
//! Three renderings are recognized:
//!
//! ```text
//! Bash: {"command": "ls"}         text:line-prefix+json
//! Bash {"command":                text:line-prefix+json_block
//!   "ls"}
//! Bash                            text:line+json_block
//! {"command": "ls"}
//! ```

use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::braces::extract_balanced_braces;

pub const SHAPE_LINE_PREFIX_JSON: &str = "text:line-prefix+json";
pub const SHAPE_LINE_PREFIX_JSON_BLOCK: &str = "text:line-prefix+json_block";
pub const SHAPE_LINE_THEN_JSON_BLOCK: &str = "text:line+json_block";

/// Text fields that may carry rendered tool calls, with their field paths.
pub fn text_candidates<'a>(obj: &'a Map<String, Value>) -> Vec<(String, &'a str)> {
    let mut out = Vec::new();
    let mut add = |path: String, value: Option<&'a Value>| {
        if let Some(text) = value.and_then(Value::as_str)
            && !text.trim().is_empty()
        {
            out.push((path, text));
        }
    };

    for key in ["text", "content", "message", "finalText"] {
        add(key.to_string(), obj.get(key));
    }

    if let Some(Value::Object(message)) = obj.get("message") {
        add("message.content".to_string(), message.get("content"));
        if let Some(Value::Array(content)) = message.get("content") {
            for (i, item) in content.iter().enumerate() {
                if let Value::Object(item) = item {
                    add(format!("message.content[{i}].text"), item.get("text"));
                    add(format!("message.content[{i}].content"), item.get("content"));
                }
            }
        }
    }

    if let Some(Value::Object(data)) = obj.get("data") {
        add("data.content".to_string(), data.get("content"));
        add("data.transformedContent".to_string(), data.get("transformedContent"));
    }

    if let Some(Value::Array(content)) = obj.get("content") {
        for (i, item) in content.iter().enumerate() {
            if let Value::Object(item) = item {
                add(format!("content[{i}].text"), item.get("text"));
                add(format!("content[{i}].content"), item.get("content"));
            }
        }
    }
    out
}

/// A tool call found in text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextToolBlock<'a> {
    pub tool_name: &'a str,
    pub raw_json: &'a str,
    pub shape: &'static str,
}

fn tool_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z][A-Za-z0-9_./-]{1,80}$").expect("tool name regex must compile")
    })
}

fn looks_like_tool_name(candidate: &str) -> Option<&str> {
    let raw = candidate.trim().trim_matches(|c| c == '<' || c == '>').trim();
    (!raw.is_empty() && tool_name_re().is_match(raw)).then_some(raw)
}

/// Lines of `text` with the byte offset each starts at. `\r\n` endings
/// are trimmed from the line but counted in the offsets.
fn lines_with_offsets(text: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut offset = 0;
    for raw in text.split_inclusive('\n') {
        let line = raw.strip_suffix('\n').unwrap_or(raw);
        let line = line.strip_suffix('\r').unwrap_or(line);
        out.push((offset, line));
        offset += raw.len();
    }
    out
}

/// Every rendered tool call in `text`, first occurrence of each
/// `(tool name, json)` pair only.
pub fn extract_text_tool_blocks(text: &str) -> Vec<TextToolBlock<'_>> {
    let mut results = Vec::new();
    if text.trim().is_empty() {
        return results;
    }
    let lines = lines_with_offsets(text);
    let mut seen: HashSet<(&str, &str)> = HashSet::new();

    for (idx, &(line_start, line)) in lines.iter().enumerate() {
        let stripped = line.trim();
        if stripped.is_empty() {
            continue;
        }

        if let Some(brace) = stripped.find('{')
            && brace > 0
        {
            let prefix = stripped[..brace].trim().trim_matches(':');
            let tool_name = prefix.split_whitespace().next().and_then(looks_like_tool_name);
            if let Some(tool_name) = tool_name
                && let Some(in_line) = line.find('{')
                && let Some(raw_json) = extract_balanced_braces(text, line_start + in_line)
                && seen.insert((tool_name, raw_json))
            {
                let shape = if raw_json.contains('\n') {
                    SHAPE_LINE_PREFIX_JSON_BLOCK
                } else {
                    SHAPE_LINE_PREFIX_JSON
                };
                results.push(TextToolBlock {
                    tool_name,
                    raw_json,
                    shape,
                });
            }
            continue;
        }

        let Some(tool_name) = looks_like_tool_name(stripped) else {
            continue;
        };
        let next = lines[idx + 1..]
            .iter()
            .find(|(_, next_line)| !next_line.trim().is_empty());
        if let Some(&(next_start, next_line)) = next
            && let Some(in_line) = next_line.find('{')
            && let Some(raw_json) = extract_balanced_braces(text, next_start + in_line)
            && seen.insert((tool_name, raw_json))
        {
            results.push(TextToolBlock {
                tool_name,
                raw_json,
                shape: SHAPE_LINE_THEN_JSON_BLOCK,
            });
        }
    }
    results
}
