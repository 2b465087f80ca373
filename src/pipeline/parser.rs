//! Link parser module for normalizing proxy configuration links
//!
//! Supported link shapes:
//! - `vmess://BASE64(JSON)` with `add`, `port`, `id` and `ps` fields
//! - `vless://UUID@HOST:PORT?params#name` (also trojan, hysteria2/hy2, tuic)
//! - `ss://BASE64(method:pass)@HOST:PORT#name` and the legacy fully
//!   base64-encoded `ss://BASE64(method:pass@HOST:PORT)` form

use crate::pipeline::models::{ConfigRecord, Protocol};
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine as _;
use percent_encoding::percent_decode_str;
use std::collections::HashSet;
use url::Url;

/// Default port when a link omits one
const DEFAULT_PORT: u16 = 443;

/// Link parser for normalizing subscription lines into config records
pub struct LinkParser;

impl LinkParser {
    /// Parse a single subscription line
    ///
    /// Returns None for empty lines, comments, unknown schemes and
    /// malformed links.
    pub fn parse_line(line: &str) -> Option<ConfigRecord> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        let (scheme, rest) = line.split_once("://")?;
        let protocol = Protocol::from_scheme(scheme)?;

        match protocol {
            Protocol::Vmess => Self::parse_vmess(line, rest),
            Protocol::Shadowsocks => Self::parse_shadowsocks(line, rest),
            _ => Self::parse_uri_form(protocol, line),
        }
    }

    /// Parse multiple lines, skipping anything unparseable
    pub fn parse_lines(content: &str) -> Vec<ConfigRecord> {
        content.lines().filter_map(Self::parse_line).collect()
    }

    /// Remove duplicate records by endpoint identity, keeping the first
    /// occurrence in input order
    pub fn dedup_records(records: Vec<ConfigRecord>) -> Vec<ConfigRecord> {
        let mut seen = HashSet::new();
        records
            .into_iter()
            .filter(|r| seen.insert(r.endpoint_key()))
            .collect()
    }

    /// Parse a vmess link whose body is a base64-encoded JSON payload
    fn parse_vmess(raw: &str, body: &str) -> Option<ConfigRecord> {
        let decoded = decode_base64_lenient(body)?;
        let payload: serde_json::Value = serde_json::from_slice(&decoded).ok()?;

        let host = payload.get("add")?.as_str()?.to_string();
        if host.is_empty() {
            return None;
        }
        let credential = payload.get("id")?.as_str()?.to_string();

        // The port field appears both as a JSON number and as a string
        // in subscription feeds
        let port = match payload.get("port")? {
            serde_json::Value::Number(n) => u16::try_from(n.as_u64()?).ok()?,
            serde_json::Value::String(s) => s.parse().ok()?,
            _ => return None,
        };

        let name = payload
            .get("ps")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(String::from);

        Some(ConfigRecord::new(
            Protocol::Vmess,
            host,
            port,
            credential,
            name,
            raw.to_string(),
        ))
    }

    /// Parse an ss link in either the SIP002 or the legacy form
    fn parse_shadowsocks(raw: &str, body: &str) -> Option<ConfigRecord> {
        let (body, name) = split_fragment(body);
        let body = body.split('?').next()?;

        if let Some((userinfo, host_part)) = body.rsplit_once('@') {
            // SIP002: base64(method:pass)@host:port, userinfo sometimes
            // left as plain percent-encoded method:pass
            let credential = match decode_base64_lenient(userinfo) {
                Some(bytes) => String::from_utf8(bytes).ok()?,
                None => percent_decode_str(userinfo).decode_utf8().ok()?.to_string(),
            };
            let (host, port) = split_host_port(host_part)?;
            return Some(ConfigRecord::new(
                Protocol::Shadowsocks,
                host,
                port,
                credential,
                name,
                raw.to_string(),
            ));
        }

        // Legacy: the whole body is base64(method:pass@host:port)
        let decoded = decode_base64_lenient(body)?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (credential, host_part) = decoded.rsplit_once('@')?;
        let (host, port) = split_host_port(host_part)?;
        Some(ConfigRecord::new(
            Protocol::Shadowsocks,
            host,
            port,
            credential.to_string(),
            name,
            raw.to_string(),
        ))
    }

    /// Parse URI-form links (vless, trojan, hysteria2, tuic)
    fn parse_uri_form(protocol: Protocol, raw: &str) -> Option<ConfigRecord> {
        if let Some(record) = Self::parse_with_url(protocol, raw) {
            return Some(record);
        }
        Self::parse_uri_manual(protocol, raw)
    }

    fn parse_with_url(protocol: Protocol, raw: &str) -> Option<ConfigRecord> {
        let url = Url::parse(raw).ok()?;

        let user = percent_decode_str(url.username()).decode_utf8().ok()?;
        if user.is_empty() {
            return None;
        }
        // tuic carries uuid:password in the userinfo
        let credential = match url.password() {
            Some(pass) => format!("{}:{}", user, pass),
            None => user.to_string(),
        };

        let host = url.host_str()?.trim_matches(|c| c == '[' || c == ']').to_string();
        let port = url.port().unwrap_or(DEFAULT_PORT);
        let name = url
            .fragment()
            .and_then(|f| percent_decode_str(f).decode_utf8().ok())
            .map(|s| s.to_string())
            .filter(|s| !s.is_empty());

        Some(ConfigRecord::new(
            protocol,
            host,
            port,
            credential,
            name,
            raw.to_string(),
        ))
    }

    /// Fallback splitter for links the url crate rejects
    fn parse_uri_manual(protocol: Protocol, raw: &str) -> Option<ConfigRecord> {
        let body = raw.split_once("://")?.1;
        let (body, name) = split_fragment(body);
        let body = body.split('?').next()?;

        let (credential, host_part) = body.rsplit_once('@')?;
        if credential.is_empty() {
            return None;
        }
        let credential = percent_decode_str(credential).decode_utf8().ok()?.to_string();
        let (host, port) = split_host_port(host_part)?;

        Some(ConfigRecord::new(
            protocol,
            host,
            port,
            credential,
            name,
            raw.to_string(),
        ))
    }
}

/// Split a `#fragment` off a link body, percent-decoding the fragment
fn split_fragment(body: &str) -> (&str, Option<String>) {
    match body.split_once('#') {
        Some((rest, frag)) => {
            let name = percent_decode_str(frag)
                .decode_utf8()
                .ok()
                .map(|s| s.to_string())
                .filter(|s| !s.is_empty());
            (rest, name)
        }
        None => (body, None),
    }
}

/// Split HOST:PORT, handling bracketed IPv6 literals; a missing port
/// defaults to 443
fn split_host_port(s: &str) -> Option<(String, u16)> {
    let s = s.trim_end_matches('/');
    if s.is_empty() {
        return None;
    }

    // Bracketed IPv6, with or without a port
    if let Some(rest) = s.strip_prefix('[') {
        let (host, after) = rest.split_once(']')?;
        if host.is_empty() {
            return None;
        }
        let port = match after.strip_prefix(':') {
            Some(p) => p.parse().ok()?,
            None => DEFAULT_PORT,
        };
        return Some((host.to_string(), port));
    }

    // Unbracketed IPv6 has multiple colons and cannot carry a port
    if s.matches(':').count() > 1 {
        return Some((s.to_string(), DEFAULT_PORT));
    }

    match s.split_once(':') {
        Some((host, port)) => {
            if host.is_empty() {
                return None;
            }
            Some((host.to_string(), port.parse().ok()?))
        }
        None => Some((s.to_string(), DEFAULT_PORT)),
    }
}

/// Decode base64 content that may be unpadded or URL-safe encoded
pub(crate) fn decode_base64_lenient(input: &str) -> Option<Vec<u8>> {
    let trimmed: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    if trimmed.is_empty() {
        return None;
    }

    let padded = match trimmed.len() % 4 {
        0 => trimmed.clone(),
        n => format!("{}{}", trimmed, "=".repeat(4 - n)),
    };

    STANDARD
        .decode(&padded)
        .or_else(|_| URL_SAFE.decode(&padded))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vmess_link(payload: serde_json::Value) -> String {
        format!("vmess://{}", STANDARD.encode(payload.to_string()))
    }

    #[test]
    fn test_parse_vless() {
        let record = LinkParser::parse_line(
            "vless://11111111-2222-3333-4444-555555555555@1.2.3.4:8443?security=tls&type=ws#Frankfurt%201",
        )
        .unwrap();
        assert_eq!(record.protocol, Protocol::Vless);
        assert_eq!(record.host, "1.2.3.4");
        assert_eq!(record.port, 8443);
        assert_eq!(record.credential, "11111111-2222-3333-4444-555555555555");
        assert_eq!(record.name.as_deref(), Some("Frankfurt 1"));
    }

    #[test]
    fn test_parse_vless_default_port() {
        let record = LinkParser::parse_line("vless://uuid@example.com").unwrap();
        assert_eq!(record.port, 443);
    }

    #[test]
    fn test_parse_trojan_ipv6() {
        let record =
            LinkParser::parse_line("trojan://secret@[2001:db8::1]:443#v6").unwrap();
        assert_eq!(record.protocol, Protocol::Trojan);
        assert_eq!(record.host, "2001:db8::1");
        assert_eq!(record.port, 443);
        assert_eq!(record.credential, "secret");
    }

    #[test]
    fn test_parse_hysteria2_alias() {
        let record = LinkParser::parse_line("hy2://pass@host.example:8443").unwrap();
        assert_eq!(record.protocol, Protocol::Hysteria2);
        assert_eq!(record.port, 8443);
    }

    #[test]
    fn test_parse_tuic_credential_pair() {
        let record =
            LinkParser::parse_line("tuic://uuid-value:pw@host.example:443").unwrap();
        assert_eq!(record.protocol, Protocol::Tuic);
        assert_eq!(record.credential, "uuid-value:pw");
    }

    #[test]
    fn test_parse_vmess_string_port() {
        let link = vmess_link(serde_json::json!({
            "v": "2",
            "ps": "Tokyo node",
            "add": "5.6.7.8",
            "port": "10086",
            "id": "deadbeef-0000-1111-2222-333344445555"
        }));
        let record = LinkParser::parse_line(&link).unwrap();
        assert_eq!(record.protocol, Protocol::Vmess);
        assert_eq!(record.host, "5.6.7.8");
        assert_eq!(record.port, 10086);
        assert_eq!(record.name.as_deref(), Some("Tokyo node"));
    }

    #[test]
    fn test_parse_vmess_numeric_port() {
        let link = vmess_link(serde_json::json!({
            "add": "5.6.7.8",
            "port": 443,
            "id": "deadbeef-0000-1111-2222-333344445555"
        }));
        let record = LinkParser::parse_line(&link).unwrap();
        assert_eq!(record.port, 443);
        assert!(record.name.is_none());
    }

    #[test]
    fn test_parse_vmess_garbage_payload() {
        assert!(LinkParser::parse_line("vmess://!!!not-base64!!!").is_none());
        let link = format!("vmess://{}", STANDARD.encode("not json"));
        assert!(LinkParser::parse_line(&link).is_none());
    }

    #[test]
    fn test_parse_ss_sip002() {
        let userinfo = STANDARD.encode("aes-256-gcm:hunter2");
        let link = format!("ss://{}@9.9.9.9:8388#Home", userinfo);
        let record = LinkParser::parse_line(&link).unwrap();
        assert_eq!(record.protocol, Protocol::Shadowsocks);
        assert_eq!(record.host, "9.9.9.9");
        assert_eq!(record.port, 8388);
        assert_eq!(record.credential, "aes-256-gcm:hunter2");
        assert_eq!(record.name.as_deref(), Some("Home"));
    }

    #[test]
    fn test_parse_ss_legacy() {
        let link = format!("ss://{}", STANDARD.encode("rc4-md5:pass@9.9.9.9:8388"));
        let record = LinkParser::parse_line(&link).unwrap();
        assert_eq!(record.host, "9.9.9.9");
        assert_eq!(record.port, 8388);
        assert_eq!(record.credential, "rc4-md5:pass");
    }

    #[test]
    fn test_parse_skips_comments_and_unknown_schemes() {
        assert!(LinkParser::parse_line("").is_none());
        assert!(LinkParser::parse_line("# comment").is_none());
        assert!(LinkParser::parse_line("http://example.com").is_none());
        assert!(LinkParser::parse_line("not a link at all").is_none());
    }

    #[test]
    fn test_parse_lines() {
        let content = "\
vless://uuid-a@1.1.1.1:443#a
# a comment
trojan://pw@2.2.2.2:443

garbage line
vless://uuid-b@3.3.3.3:443";
        let records = LinkParser::parse_lines(content);
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn test_dedup_records() {
        let content = "\
vless://same-uuid@1.1.1.1:443#first
vless://same-uuid@1.1.1.1:443#second
vless://same-uuid@1.1.1.1:444
vless://other-uuid@1.1.1.1:443
trojan://same-uuid@1.1.1.1:443";
        let records = LinkParser::parse_lines(content);
        let unique = LinkParser::dedup_records(records);
        // Same endpoint with a different fragment collapses; a different
        // port, credential or protocol does not
        assert_eq!(unique.len(), 4);
        assert_eq!(unique[0].name.as_deref(), Some("first"));
    }

    #[test]
    fn test_split_host_port() {
        assert_eq!(
            split_host_port("example.com:8080"),
            Some(("example.com".to_string(), 8080))
        );
        assert_eq!(
            split_host_port("example.com"),
            Some(("example.com".to_string(), 443))
        );
        assert_eq!(
            split_host_port("[2001:db8::1]:8443"),
            Some(("2001:db8::1".to_string(), 8443))
        );
        assert_eq!(
            split_host_port("2001:db8::1"),
            Some(("2001:db8::1".to_string(), 443))
        );
        assert_eq!(split_host_port(""), None);
        assert_eq!(split_host_port("host:notaport"), None);
    }

    #[test]
    fn test_decode_base64_lenient() {
        // Unpadded input
        assert_eq!(
            decode_base64_lenient("aGVsbG8").unwrap(),
            b"hello".to_vec()
        );
        // URL-safe alphabet
        let encoded = URL_SAFE.encode([0xfb, 0xff]);
        assert_eq!(
            decode_base64_lenient(&encoded).unwrap(),
            vec![0xfb, 0xff]
        );
        assert!(decode_base64_lenient("!!!").is_none());
    }
}
