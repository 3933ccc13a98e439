//! String-aware bracket scanning.
//!
//! JSON embedded in free text and JSON documents too irregular to parse
//! whole are both cut apart by counting brackets. Brackets inside string
//! literals do not count, and a backslash escapes the next character only
//! inside a string. All delimiters are ASCII, so byte offsets always land
//! on UTF-8 boundaries.

use regex::Regex;
use std::sync::OnceLock;

#[derive(Default)]
struct StringState {
    in_string: bool,
    escape: bool,
}

impl StringState {
    /// Advance over one byte. Returns true when the byte is structural
    /// (outside any string literal and not the opening quote).
    fn step(&mut self, byte: u8) -> bool {
        if self.in_string {
            if self.escape {
                self.escape = false;
            } else if byte == b'\\' {
                self.escape = true;
            } else if byte == b'"' {
                self.in_string = false;
            }
            return false;
        }
        if byte == b'"' {
            self.in_string = true;
            return false;
        }
        true
    }
}

/// The `{...}` object starting at byte `start`, through its matching `}`.
///
/// `None` if the braces never balance.
pub fn extract_balanced_braces(text: &str, start: usize) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut state = StringState::default();
    let mut depth: i64 = 0;
    for (offset, &byte) in bytes.get(start..)?.iter().enumerate() {
        if !state.step(byte) {
            continue;
        }
        match byte {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return text.get(start..start + offset + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Top-level items of the JSON array whose `[` is at byte `start`, as raw
/// trimmed slices. Items that are cut off by the end of input are dropped.
pub fn split_json_array_items(text: &str, start: usize) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut items = Vec::new();
    let mut state = StringState::default();
    let mut depth: i64 = 0;
    let mut item_start: Option<usize> = None;

    let Some(tail) = bytes.get(start..) else {
        return items;
    };
    for (offset, &byte) in tail.iter().enumerate() {
        let at = start + offset;
        if !state.step(byte) {
            // A string item starts on its opening quote.
            if depth == 1 && item_start.is_none() && byte == b'"' {
                item_start = Some(at);
            }
            continue;
        }
        if byte == b'[' {
            depth += 1;
            if depth == 1 {
                continue;
            }
        }
        if byte == b']' {
            if depth == 1 {
                if let Some(begin) = item_start {
                    items.push(text[begin..at].trim());
                }
                return items;
            }
            depth -= 1;
        }
        if byte == b'{' && depth >= 1 {
            if depth == 1 && item_start.is_none() {
                item_start = Some(at);
            }
            depth += 1;
            continue;
        }
        if byte == b'}' && depth > 1 {
            depth -= 1;
            continue;
        }
        if depth == 1 {
            if byte == b',' {
                if let Some(begin) = item_start.take() {
                    items.push(text[begin..at].trim());
                }
            } else if !byte.is_ascii_whitespace() && item_start.is_none() {
                item_start = Some(at);
            }
        }
    }
    items
}

fn list_key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#""(messages|history|items)"\s*:\s*\["#).expect("list key regex must compile")
    })
}

/// Raw items of a session document: the top-level array, else the first
/// `messages`, `history` or `items` array found (in that key order).
pub fn extract_raw_items(text: &str) -> Vec<&str> {
    if text.trim_start().starts_with('[') {
        return match text.find('[') {
            Some(start) => split_json_array_items(text, start),
            None => Vec::new(),
        };
    }
    for key in ["messages", "history", "items"] {
        let found = list_key_re()
            .captures_iter(text)
            .find(|caps| caps.get(1).is_some_and(|m| m.as_str() == key));
        if let Some(whole) = found.and_then(|caps| caps.get(0)) {
            return split_json_array_items(text, whole.end() - 1);
        }
    }
    Vec::new()
}
