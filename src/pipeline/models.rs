//! Pipeline data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Proxy protocol enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    Vmess,
    Vless,
    Trojan,
    Shadowsocks,
    Hysteria2,
    Tuic,
}

impl Protocol {
    /// Map a URI scheme onto a known protocol
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_lowercase().as_str() {
            "vmess" => Some(Protocol::Vmess),
            "vless" => Some(Protocol::Vless),
            "trojan" => Some(Protocol::Trojan),
            "ss" => Some(Protocol::Shadowsocks),
            "hysteria2" | "hy2" => Some(Protocol::Hysteria2),
            "tuic" => Some(Protocol::Tuic),
            _ => None,
        }
    }

    /// Canonical URI scheme for this protocol
    pub fn scheme(&self) -> &'static str {
        match self {
            Protocol::Vmess => "vmess",
            Protocol::Vless => "vless",
            Protocol::Trojan => "trojan",
            Protocol::Shadowsocks => "ss",
            Protocol::Hysteria2 => "hysteria2",
            Protocol::Tuic => "tuic",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.scheme())
    }
}

/// A single parsed proxy configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRecord {
    pub protocol: Protocol,
    pub host: String,
    pub port: u16,
    /// UUID, password or method:password depending on protocol
    pub credential: String,
    /// Display name carried in the link fragment (or vmess `ps` field)
    pub name: Option<String>,
    /// The original link as collected
    pub raw: String,
}

impl ConfigRecord {
    pub fn new(
        protocol: Protocol,
        host: String,
        port: u16,
        credential: String,
        name: Option<String>,
        raw: String,
    ) -> Self {
        Self {
            protocol,
            host,
            port,
            credential,
            name,
            raw,
        }
    }

    /// Identity key used for deduplication
    pub fn endpoint_key(&self) -> (Protocol, String, u16, String) {
        (
            self.protocol,
            self.host.to_lowercase(),
            self.port,
            self.credential.clone(),
        )
    }

    /// The raw link with any `#name` fragment stripped
    pub fn link_without_name(&self) -> &str {
        match self.raw.find('#') {
            Some(pos) => &self.raw[..pos],
            None => &self.raw,
        }
    }

    /// Endpoint in HOST:PORT form
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ConfigRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.protocol, self.host, self.port)
    }
}

/// Outcome of probing a single config endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeStatus {
    Reachable,
    Unreachable(String),
    Timeout,
}

/// Result of a probe against one config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub record: ConfigRecord,
    pub status: ProbeStatus,
    /// Connect latency, present only for reachable endpoints
    pub latency_ms: Option<u64>,
    pub checked_at: DateTime<Utc>,
}

impl ProbeResult {
    pub fn reachable(record: ConfigRecord, latency_ms: u64) -> Self {
        Self {
            record,
            status: ProbeStatus::Reachable,
            latency_ms: Some(latency_ms),
            checked_at: Utc::now(),
        }
    }

    pub fn unreachable(record: ConfigRecord, error: String) -> Self {
        Self {
            record,
            status: ProbeStatus::Unreachable(error),
            latency_ms: None,
            checked_at: Utc::now(),
        }
    }

    pub fn timeout(record: ConfigRecord) -> Self {
        Self {
            record,
            status: ProbeStatus::Timeout,
            latency_ms: None,
            checked_at: Utc::now(),
        }
    }

    pub fn is_reachable(&self) -> bool {
        matches!(self.status, ProbeStatus::Reachable)
    }
}

/// Ordered set of named links for one region
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegionBucket {
    /// ISO 3166-1 alpha-2 code, or "Unknown"
    pub code: String,
    /// Links in rank order
    pub links: Vec<String>,
}

impl RegionBucket {
    pub fn new(code: String) -> Self {
        Self {
            code,
            links: Vec::new(),
        }
    }

    pub fn push(&mut self, link: String) {
        self.links.push(link);
    }

    pub fn count(&self) -> usize {
        self.links.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> ConfigRecord {
        ConfigRecord::new(
            Protocol::Vless,
            "example.com".to_string(),
            443,
            "11111111-2222-3333-4444-555555555555".to_string(),
            Some("old name".to_string()),
            "vless://11111111-2222-3333-4444-555555555555@example.com:443?security=tls#old%20name"
                .to_string(),
        )
    }

    #[test]
    fn test_protocol_from_scheme() {
        assert_eq!(Protocol::from_scheme("vmess"), Some(Protocol::Vmess));
        assert_eq!(Protocol::from_scheme("VLESS"), Some(Protocol::Vless));
        assert_eq!(Protocol::from_scheme("hy2"), Some(Protocol::Hysteria2));
        assert_eq!(Protocol::from_scheme("ss"), Some(Protocol::Shadowsocks));
        assert_eq!(Protocol::from_scheme("ftp"), None);
    }

    #[test]
    fn test_protocol_display() {
        assert_eq!(Protocol::Hysteria2.to_string(), "hysteria2");
        assert_eq!(Protocol::Shadowsocks.to_string(), "ss");
    }

    #[test]
    fn test_endpoint_key_case_insensitive_host() {
        let mut a = sample_record();
        let mut b = sample_record();
        a.host = "Example.COM".to_string();
        b.host = "example.com".to_string();
        assert_eq!(a.endpoint_key(), b.endpoint_key());
    }

    #[test]
    fn test_link_without_name() {
        let record = sample_record();
        assert_eq!(
            record.link_without_name(),
            "vless://11111111-2222-3333-4444-555555555555@example.com:443?security=tls"
        );

        let mut bare = sample_record();
        bare.raw = "vless://uuid@example.com:443".to_string();
        assert_eq!(bare.link_without_name(), "vless://uuid@example.com:443");
    }

    #[test]
    fn test_probe_result_constructors() {
        let record = sample_record();

        let result = ProbeResult::reachable(record.clone(), 120);
        assert!(result.is_reachable());
        assert_eq!(result.latency_ms, Some(120));

        let result = ProbeResult::unreachable(record.clone(), "connection refused".to_string());
        assert!(!result.is_reachable());
        assert_eq!(result.latency_ms, None);

        let result = ProbeResult::timeout(record);
        assert!(!result.is_reachable());
    }

    #[test]
    fn test_region_bucket() {
        let mut bucket = RegionBucket::new("DE".to_string());
        bucket.push("vless://a@1.2.3.4:443".to_string());
        bucket.push("vless://b@1.2.3.5:443".to_string());
        assert_eq!(bucket.code, "DE");
        assert_eq!(bucket.count(), 2);
    }
}
