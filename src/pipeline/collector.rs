//! Collector module for fetching candidate config links from upstream sources
//!
//! Sources are either GitHub raw paths (`owner/repo/branch/file`) or full
//! URLs. Source bodies are frequently base64-wrapped subscription blobs,
//! so each body is transparently decoded before being split into lines.

use crate::pipeline::parser::decode_base64_lenient;
use crate::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

/// Default timeout for HTTP requests in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default user agent for HTTP requests
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Base URL for GitHub raw content
const RAW_GITHUB_BASE: &str = "https://raw.githubusercontent.com";

/// Regex pattern matching an `owner/repo/branch/path` GitHub raw path
static GITHUB_PATH_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_.\-]+/[A-Za-z0-9_.\-]+/[^/\s]+/\S+$")
        .expect("Invalid GitHub path regex")
});

/// A single upstream subscription source
#[derive(Debug, Clone)]
pub struct Source {
    /// Display name of the source
    pub name: String,
    /// URL to fetch
    pub url: String,
}

impl Source {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
        }
    }

    /// Build a source from an `owner/repo/branch/path` GitHub raw path
    pub fn from_github_path(path: &str) -> Self {
        let path = path.trim_matches('/');
        Self {
            name: path.to_string(),
            url: format!("{}/{}", RAW_GITHUB_BASE, path),
        }
    }

    /// Build a source from a full URL
    pub fn from_url(url: &str) -> Self {
        Self {
            name: url.to_string(),
            url: url.to_string(),
        }
    }
}

/// Check that a source entry looks like `owner/repo/branch/path`
pub fn is_github_path(path: &str) -> bool {
    GITHUB_PATH_REGEX.is_match(path.trim_matches('/'))
}

/// Build the source list from settings entries, skipping malformed
/// GitHub paths
pub fn sources_from_lists(files: &[String], urls: &[String]) -> Vec<Source> {
    let mut sources = Vec::new();

    for path in files {
        if is_github_path(path) {
            sources.push(Source::from_github_path(path));
        } else {
            warn!(%path, "skipping malformed GitHub source path");
        }
    }
    sources.extend(urls.iter().map(|u| Source::from_url(u)));

    sources
}

/// Result of fetching a single source
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// The source that was fetched
    pub source: String,
    /// Candidate config lines extracted from the body
    pub lines: Vec<String>,
    /// Error message if the fetch failed
    pub error: Option<String>,
}

impl FetchResult {
    pub fn success(source: String, lines: Vec<String>) -> Self {
        Self {
            source,
            lines,
            error: None,
        }
    }

    pub fn failure(source: String, error: String) -> Self {
        Self {
            source,
            lines: Vec::new(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Configuration for the source collector
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Timeout for HTTP requests
    pub timeout: Duration,
    /// User agent for HTTP requests
    pub user_agent: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl CollectorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}

/// Collector for fetching config lines from subscription sources
pub struct Collector {
    client: Client,
}

impl Collector {
    /// Create a new collector with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(CollectorConfig::default())
    }

    /// Create a new collector with custom configuration
    pub fn with_config(config: CollectorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self { client })
    }

    /// Fetch a single source and extract its config lines
    pub async fn fetch_source(&self, source: &Source) -> Result<Vec<String>> {
        let response = self.client.get(&source.url).send().await?;
        let response = response.error_for_status()?;
        let body = response.text().await?;
        let lines = extract_lines(&body);
        debug!(source = %source.name, lines = lines.len(), "fetched source");
        Ok(lines)
    }

    /// Fetch multiple sources, returning a result per source so one bad
    /// source never aborts the cycle
    pub async fn fetch_sources_with_results(&self, sources: &[Source]) -> Vec<FetchResult> {
        let mut results = Vec::new();

        for source in sources {
            let result = match self.fetch_source(source).await {
                Ok(lines) => FetchResult::success(source.name.clone(), lines),
                Err(e) => FetchResult::failure(source.name.clone(), e.to_string()),
            };
            results.push(result);
        }

        results
    }
}

/// Merge fetch results into a single ordered list of unique lines
pub fn unique_lines(results: &[FetchResult]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut lines = Vec::new();

    for result in results {
        for line in &result.lines {
            if seen.insert(line.clone()) {
                lines.push(line.clone());
            }
        }
    }

    lines
}

/// Split a source body into non-empty lines, decoding base64-wrapped
/// bodies first
fn extract_lines(body: &str) -> Vec<String> {
    let decoded = decode_base64_lenient(body.trim())
        .map(|bytes| String::from_utf8_lossy(&bytes).to_string());
    let text = decoded.as_deref().unwrap_or(body);

    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;

    #[test]
    fn test_source_from_github_path() {
        let source = Source::from_github_path("owner/repo/main/sub.txt");
        assert_eq!(source.name, "owner/repo/main/sub.txt");
        assert_eq!(
            source.url,
            "https://raw.githubusercontent.com/owner/repo/main/sub.txt"
        );

        // Leading slashes are tolerated
        let source = Source::from_github_path("/owner/repo/main/sub.txt");
        assert_eq!(
            source.url,
            "https://raw.githubusercontent.com/owner/repo/main/sub.txt"
        );
    }

    #[test]
    fn test_is_github_path() {
        assert!(is_github_path("owner/repo/main/sub.txt"));
        assert!(is_github_path("owner/repo/main/splitted/mixed"));
        assert!(is_github_path("/owner/repo/main/sub.txt"));

        assert!(!is_github_path("owner/repo"));
        assert!(!is_github_path("https://example.com/sub.txt"));
        assert!(!is_github_path("owner/repo/branch with space/sub.txt"));
        assert!(!is_github_path(""));
    }

    #[test]
    fn test_sources_from_lists_skips_malformed_paths() {
        let files = vec![
            "owner/repo/main/sub.txt".to_string(),
            "not-a-path".to_string(),
        ];
        let urls = vec!["https://example.com/sub.txt".to_string()];

        let sources = sources_from_lists(&files, &urls);
        assert_eq!(sources.len(), 2);
        assert_eq!(
            sources[0].url,
            "https://raw.githubusercontent.com/owner/repo/main/sub.txt"
        );
        assert_eq!(sources[1].url, "https://example.com/sub.txt");
    }

    #[test]
    fn test_extract_lines_plain() {
        let body = "vless://a@1.1.1.1:443\n\n  trojan://b@2.2.2.2:443  \n";
        let lines = extract_lines(body);
        assert_eq!(
            lines,
            vec![
                "vless://a@1.1.1.1:443".to_string(),
                "trojan://b@2.2.2.2:443".to_string()
            ]
        );
    }

    #[test]
    fn test_extract_lines_base64_body() {
        let plain = "vless://a@1.1.1.1:443\ntrojan://b@2.2.2.2:443";
        let body = STANDARD.encode(plain);
        let lines = extract_lines(&body);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "vless://a@1.1.1.1:443");
    }

    #[test]
    fn test_unique_lines_across_sources() {
        let results = vec![
            FetchResult::success(
                "a".to_string(),
                vec!["one".to_string(), "two".to_string()],
            ),
            FetchResult::failure("b".to_string(), "timed out".to_string()),
            FetchResult::success(
                "c".to_string(),
                vec!["two".to_string(), "three".to_string()],
            ),
        ];
        let lines = unique_lines(&results);
        assert_eq!(
            lines,
            vec!["one".to_string(), "two".to_string(), "three".to_string()]
        );
    }

    #[test]
    fn test_fetch_result_states() {
        let ok = FetchResult::success("src".to_string(), vec!["x".to_string()]);
        assert!(ok.is_success());

        let bad = FetchResult::failure("src".to_string(), "404".to_string());
        assert!(!bad.is_success());
        assert!(bad.lines.is_empty());
    }
}
