//! Pipeline settings loaded from a JSON file

use crate::Result;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default probe timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Default number of concurrent probes
const DEFAULT_CONCURRENCY: usize = 200;

/// Default output directory for subscription artifacts
const DEFAULT_OUT_DIR: &str = "subscriptions";

/// Default GeoLite2 country database path
const DEFAULT_MMDB_PATH: &str = "GeoLite2-Country.mmdb";

/// Upstream source lists
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceSettings {
    /// GitHub raw paths in `owner/repo/branch/path` form
    #[serde(default)]
    pub files: Vec<String>,
    /// Full URLs fetched as-is
    #[serde(default)]
    pub urls: Vec<String>,
}

/// Settings for a full aggregation cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub sources: SourceSettings,
    /// Probe timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Number of concurrent probes
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Output directory for subscription artifacts
    #[serde(default = "default_out_dir")]
    pub out_dir: String,
    /// Brand labels sampled into config names
    #[serde(default = "default_brands")]
    pub brands: Vec<String>,
    /// Emojis sampled into config names
    #[serde(default = "default_emojis")]
    pub emojis: Vec<String>,
    /// Path to the GeoLite2 country database
    #[serde(default = "default_mmdb_path")]
    pub mmdb_path: String,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_out_dir() -> String {
    DEFAULT_OUT_DIR.to_string()
}

fn default_brands() -> Vec<String> {
    vec!["V2XCore".to_string()]
}

fn default_emojis() -> Vec<String> {
    vec!["⚡️".to_string()]
}

fn default_mmdb_path() -> String {
    DEFAULT_MMDB_PATH.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sources: SourceSettings::default(),
            timeout: default_timeout(),
            concurrency: default_concurrency(),
            out_dir: default_out_dir(),
            brands: default_brands(),
            emojis: default_emojis(),
            mmdb_path: default_mmdb_path(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {:?}", path))?;
        let settings: Settings = serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON in settings file {:?}", path))?;
        Ok(settings)
    }
}
