//! Aggregation pipeline for subscription configs
//!
//! This module provides functionality for:
//! - Collecting candidate config links from upstream sources
//! - Parsing links into structured records and deduplicating them
//! - Probing each endpoint and ranking survivors by latency
//! - Grouping by region/protocol and writing subscription artifacts

pub mod collector;
pub mod geo;
pub mod models;
pub mod output;
pub mod parser;
pub mod prober;
pub mod ranker;

pub use collector::{Collector, CollectorConfig, FetchResult, Source};
pub use geo::{GeoLocator, Region};
pub use models::{ConfigRecord, ProbeResult, ProbeStatus, Protocol, RegionBucket};
pub use output::OutputWriter;
pub use parser::LinkParser;
pub use prober::{Prober, ProberConfig};
pub use ranker::{Aggregate, Ranker};

use crate::settings::Settings;
use crate::Result;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Counters for one full aggregation cycle
#[derive(Debug, Clone)]
pub struct CycleSummary {
    /// Sources fetched successfully
    pub sources_ok: usize,
    /// Sources that failed to fetch
    pub sources_failed: usize,
    /// Unique raw lines collected
    pub collected: usize,
    /// Lines that parsed into config records
    pub parsed: usize,
    /// Records surviving deduplication
    pub unique: usize,
    /// Records reachable after probing
    pub reachable: usize,
    /// Wall time for the whole cycle
    pub elapsed: Duration,
}

/// Run one full collect → parse → dedup → probe → rank → write cycle
pub async fn run_cycle(settings: &Settings) -> Result<CycleSummary> {
    let started = Instant::now();

    let sources = collector::sources_from_lists(&settings.sources.files, &settings.sources.urls);

    let collector = Collector::new()?;
    let fetch_results = collector.fetch_sources_with_results(&sources).await;
    for result in &fetch_results {
        if let Some(error) = &result.error {
            warn!(source = %result.source, %error, "source fetch failed");
        }
    }
    let sources_failed = fetch_results.iter().filter(|r| !r.is_success()).count();

    let lines = collector::unique_lines(&fetch_results);
    let records: Vec<ConfigRecord> = lines
        .iter()
        .filter_map(|line| LinkParser::parse_line(line))
        .collect();
    let parsed = records.len();
    let unique = LinkParser::dedup_records(records);
    info!(
        collected = lines.len(),
        parsed,
        unique = unique.len(),
        "collected and parsed sources"
    );

    let prober = Prober::with_config(
        ProberConfig::new()
            .with_timeout(Duration::from_secs(settings.timeout))
            .with_concurrency(settings.concurrency),
    );
    let unique_count = unique.len();
    let ranked = prober.probe_and_rank(unique).await;
    info!(reachable = ranked.len(), probed = unique_count, "probing finished");

    let geo = match GeoLocator::from_path(&settings.mmdb_path) {
        Ok(locator) => Some(locator),
        Err(e) => {
            warn!(path = %settings.mmdb_path, error = %e, "geo database unavailable, regions will be Unknown");
            None
        }
    };

    let ranker = Ranker::new(geo, settings.brands.clone(), settings.emojis.clone());
    let aggregate = ranker.aggregate(&ranked).await;

    OutputWriter::new(&settings.out_dir).write(&aggregate)?;

    Ok(CycleSummary {
        sources_ok: fetch_results.len() - sources_failed,
        sources_failed,
        collected: lines.len(),
        parsed,
        unique: unique_count,
        reachable: ranked.len(),
        elapsed: started.elapsed(),
    })
}
