//! Upstream version sources: release feeds, package registries, and
//! regex-over-page scrapes, tried in rank order.

use driftwatch_kernel::{Semver, extract_semver};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const USER_AGENT: &str = "driftwatch/0.1";

/// Failed attempts kept in a report, oldest first.
pub const MAX_REPORTED_ERRORS: usize = 3;

/// One configured place to learn the latest published version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UpstreamSource {
    GithubLatestRelease {
        #[serde(default)]
        repo: String,
    },
    NpmLatest {
        #[serde(default)]
        package: String,
    },
    UrlRegexSemverMax {
        #[serde(default)]
        url: String,
        #[serde(default)]
        pattern: String,
    },
    #[serde(other)]
    Unsupported,
}

impl UpstreamSource {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::GithubLatestRelease { .. } => "github_latest_release",
            Self::NpmLatest { .. } => "npm_latest",
            Self::UrlRegexSemverMax { .. } => "url_regex_semver_max",
            Self::Unsupported => "unsupported",
        }
    }
}

/// Why one source produced no answer. Recorded, then the next source is tried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum UpstreamFetchError {
    #[error("github source has no repo")]
    MissingRepo,

    #[error("npm source has no package")]
    MissingPackage,

    #[error("regex source needs both url and pattern")]
    MissingUrlOrPattern,

    #[error("invalid version pattern {pattern:?}: {detail}")]
    InvalidPattern { pattern: String, detail: String },

    #[error("fetch failed for {url}: {detail}")]
    FetchFailed { url: String, detail: String },

    #[error("unexpected response from {url}")]
    InvalidResponse { url: String },

    #[error("no versions found at {url}")]
    NoVersionsFound { url: String },

    #[error("unsupported upstream source kind")]
    UnsupportedSourceKind,
}

/// HTTP GET returning the body as text. Non-2xx statuses are errors.
pub trait HttpFetch {
    fn get_text(&self, url: &str) -> Result<String, String>;
}

/// [`HttpFetch`] over a blocking `ureq` agent.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build();
        Self { agent }
    }
}

impl HttpFetch for HttpFetcher {
    fn get_text(&self, url: &str) -> Result<String, String> {
        match self
            .agent
            .get(url)
            .set("Accept", "text/html,application/json;q=0.9,*/*;q=0.8")
            .call()
        {
            Ok(resp) => resp.into_string().map_err(|e| e.to_string()),
            Err(ureq::Error::Status(status, _)) => Err(format!("HTTP {status}")),
            Err(err) => Err(err.to_string()),
        }
    }
}

/// A source that answered. `version` may still be `None` when the answer
/// carried no recognizable version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpstreamRecord {
    pub kind: String,
    pub url: String,
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
}

fn get_json(http: &dyn HttpFetch, url: &str) -> Result<Value, UpstreamFetchError> {
    let text = http
        .get_text(url)
        .map_err(|detail| UpstreamFetchError::FetchFailed {
            url: url.to_string(),
            detail,
        })?;
    serde_json::from_str(&text).map_err(|e| UpstreamFetchError::FetchFailed {
        url: url.to_string(),
        detail: format!("invalid JSON: {e}"),
    })
}

fn string_field(obj: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Percent-encode everything outside the RFC 3986 unreserved set, so a
/// scoped npm package like `@scope/name` stays one path segment.
pub fn encode_path_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

/// Highest semver among `pattern` matches in `text`, using capture group 1
/// when the pattern has one.
pub fn max_semver_matching(pattern: &Regex, text: &str) -> Option<Semver> {
    pattern
        .captures_iter(text)
        .filter_map(|caps| {
            let raw = caps.get(1).or_else(|| caps.get(0))?;
            Semver::find(raw.as_str())
        })
        .max()
}

pub fn fetch_upstream(
    source: &UpstreamSource,
    http: &dyn HttpFetch,
) -> Result<UpstreamRecord, UpstreamFetchError> {
    match source {
        UpstreamSource::GithubLatestRelease { repo } => {
            if repo.is_empty() {
                return Err(UpstreamFetchError::MissingRepo);
            }
            let url = format!("https://api.github.com/repos/{repo}/releases/latest");
            let Value::Object(obj) = get_json(http, &url)? else {
                return Err(UpstreamFetchError::InvalidResponse { url });
            };
            let tag_name = string_field(&obj, "tag_name");
            let name = string_field(&obj, "name");
            let raw = tag_name.as_deref().or(name.as_deref()).unwrap_or_default();
            Ok(UpstreamRecord {
                kind: source.kind().to_string(),
                version: extract_semver(raw),
                html_url: string_field(&obj, "html_url"),
                body: string_field(&obj, "body"),
                published_at: string_field(&obj, "published_at"),
                tag_name,
                name,
                url,
            })
        }
        UpstreamSource::NpmLatest { package } => {
            if package.is_empty() {
                return Err(UpstreamFetchError::MissingPackage);
            }
            let url = format!(
                "https://registry.npmjs.org/{}/latest",
                encode_path_segment(package)
            );
            let raw = get_json(http, &url)?
                .get("version")
                .and_then(Value::as_str)
                .map(str::to_string);
            let version = raw.as_deref().and_then(extract_semver).or(raw);
            Ok(UpstreamRecord {
                kind: source.kind().to_string(),
                url,
                version,
                ..UpstreamRecord::default()
            })
        }
        UpstreamSource::UrlRegexSemverMax { url, pattern } => {
            if url.is_empty() || pattern.is_empty() {
                return Err(UpstreamFetchError::MissingUrlOrPattern);
            }
            let regex = Regex::new(pattern).map_err(|e| UpstreamFetchError::InvalidPattern {
                pattern: pattern.clone(),
                detail: e.to_string(),
            })?;
            let text = http
                .get_text(url)
                .map_err(|detail| UpstreamFetchError::FetchFailed {
                    url: url.clone(),
                    detail,
                })?;
            let best = max_semver_matching(&regex, &text)
                .ok_or_else(|| UpstreamFetchError::NoVersionsFound { url: url.clone() })?;
            Ok(UpstreamRecord {
                kind: source.kind().to_string(),
                url: url.clone(),
                version: Some(best.to_string()),
                ..UpstreamRecord::default()
            })
        }
        UpstreamSource::Unsupported => Err(UpstreamFetchError::UnsupportedSourceKind),
    }
}

/// Outcome of walking a producer's ranked source list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpstreamResolution {
    pub parsed_version: Option<String>,
    pub source_used: Option<UpstreamRecord>,
    /// The first [`MAX_REPORTED_ERRORS`] failures.
    pub errors: Vec<UpstreamFetchError>,
    #[serde(skip)]
    pub sources_configured: usize,
}

impl UpstreamResolution {
    /// Sources were configured and none of them yielded a version.
    pub fn monitoring_failed(&self) -> bool {
        self.sources_configured > 0 && self.parsed_version.is_none()
    }
}

/// Try each source in order; the first that answers wins.
pub fn resolve_upstream(sources: &[UpstreamSource], http: &dyn HttpFetch) -> UpstreamResolution {
    let mut resolution = UpstreamResolution {
        sources_configured: sources.len(),
        ..UpstreamResolution::default()
    };
    for source in sources {
        match fetch_upstream(source, http) {
            Ok(record) => {
                resolution.parsed_version = record.version.clone();
                resolution.source_used = Some(record);
                break;
            }
            Err(error) => {
                tracing::warn!(kind = source.kind(), %error, "upstream source failed, trying next");
                if resolution.errors.len() < MAX_REPORTED_ERRORS {
                    resolution.errors.push(error);
                }
            }
        }
    }
    resolution
}
