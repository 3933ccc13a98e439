//! Risk keywords in release notes.

use serde::Serialize;

use crate::config::RiskKeywords;
use crate::upstream::UpstreamRecord;

/// Keywords that occur in `text`, case-insensitively, in configured order.
pub fn keyword_hits(text: &str, keywords: &[String]) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let haystack = text.to_lowercase();
    keywords
        .iter()
        .filter(|keyword| !keyword.is_empty() && haystack.contains(&keyword.to_lowercase()))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KeywordHits {
    pub schema_keyword_hits: Vec<String>,
    pub usage_keyword_hits: Vec<String>,
}

impl KeywordHits {
    pub fn any(&self) -> bool {
        !self.schema_keyword_hits.is_empty() || !self.usage_keyword_hits.is_empty()
    }
}

/// Match against the whole serialized upstream record, so release titles,
/// tags and bodies are all searched.
pub fn scan_upstream(record: Option<&UpstreamRecord>, keywords: &RiskKeywords) -> KeywordHits {
    let text = record
        .and_then(|record| serde_json::to_string(record).ok())
        .unwrap_or_default();
    KeywordHits {
        schema_keyword_hits: keyword_hits(&text, &keywords.schema),
        usage_keyword_hits: keyword_hits(&text, &keywords.usage),
    }
}
