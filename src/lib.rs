//! v2sub - Subscription Aggregator and Config Health Checker
//!
//! This crate collects proxy configuration links from upstream sources,
//! parses and deduplicates them, probes each endpoint for reachability,
//! and emits ranked subscription files (plain, base64, per-region and
//! per-protocol).

pub mod pipeline;
pub mod settings;

pub use pipeline::*;
pub use settings::Settings;

/// Application result type
pub type Result<T> = anyhow::Result<T>;
