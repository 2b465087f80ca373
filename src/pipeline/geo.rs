//! Geolocation module for tagging config hosts with a region using MMDB

use crate::Result;
use maxminddb::{geoip2, Reader};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

/// Region code used when lookup or resolution fails
pub const UNKNOWN_REGION: &str = "Unknown";

/// Flag shown for unknown regions
const UNKNOWN_FLAG: &str = "🌐";

/// Offset from an ASCII letter to its regional indicator symbol
const REGIONAL_INDICATOR_OFFSET: u32 = 127397;

/// Region tag for a config host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// ISO 3166-1 alpha-2 code, or "Unknown"
    pub code: String,
    /// Flag emoji for the region
    pub flag: String,
}

impl Region {
    /// Build a region from an ISO country code
    pub fn from_code(code: &str) -> Self {
        Self {
            code: code.to_uppercase(),
            flag: flag_for_code(code),
        }
    }

    pub fn unknown() -> Self {
        Self {
            code: UNKNOWN_REGION.to_string(),
            flag: UNKNOWN_FLAG.to_string(),
        }
    }

    pub fn is_known(&self) -> bool {
        self.code != UNKNOWN_REGION
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.flag, self.code)
    }
}

/// Derive the flag emoji from a two-letter country code
fn flag_for_code(code: &str) -> String {
    let flag: String = code
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .filter_map(|c| char::from_u32(c.to_ascii_uppercase() as u32 + REGIONAL_INDICATOR_OFFSET))
        .collect();

    if flag.is_empty() {
        UNKNOWN_FLAG.to_string()
    } else {
        flag
    }
}

/// GeoLocator for looking up IP addresses in a country MMDB
pub struct GeoLocator {
    reader: Arc<Reader<Vec<u8>>>,
}

impl GeoLocator {
    /// Create a new GeoLocator from an MMDB file path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = Reader::open_readfile(path)?;
        Ok(Self {
            reader: Arc::new(reader),
        })
    }

    /// Look up the region for an IpAddr
    pub fn lookup_ip(&self, ip: IpAddr) -> Result<Region> {
        let lookup_result = self.reader.lookup(ip)?;
        let country: Option<geoip2::Country> = lookup_result.decode()?;

        let Some(country) = country else {
            return Ok(Region::unknown());
        };

        match country.country.iso_code {
            Some(code) => Ok(Region::from_code(code)),
            None => Ok(Region::unknown()),
        }
    }
}

impl Clone for GeoLocator {
    fn clone(&self) -> Self {
        Self {
            reader: Arc::clone(&self.reader),
        }
    }
}

/// Resolve a host to an IP and tag it with a region
///
/// Any resolution or lookup failure degrades to the unknown region rather
/// than failing the cycle.
pub async fn region_for_host(locator: Option<&GeoLocator>, host: &str, port: u16) -> Region {
    let Some(locator) = locator else {
        return Region::unknown();
    };

    let ip = match host.parse::<IpAddr>() {
        Ok(ip) => Some(ip),
        Err(_) => tokio::net::lookup_host((host, port))
            .await
            .ok()
            .and_then(|mut addrs| addrs.next())
            .map(|addr| addr.ip()),
    };

    match ip {
        Some(ip) => locator.lookup_ip(ip).unwrap_or_else(|_| Region::unknown()),
        None => Region::unknown(),
    }
}
