//! Health prober module for measuring config endpoint reachability
//!
//! Each config gets one TCP connect per cycle; the connect latency is the
//! speed measurement the final ordering is built from.

use crate::pipeline::models::{ConfigRecord, ProbeResult};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tracing::debug;

/// Default timeout for a single probe in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Default number of concurrent probes
const DEFAULT_CONCURRENCY: usize = 200;

/// Configuration for the health prober
#[derive(Debug, Clone)]
pub struct ProberConfig {
    /// Timeout for each probe
    pub timeout: Duration,
    /// Number of concurrent probes
    pub concurrency: usize,
}

impl Default for ProberConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl ProberConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }
}

/// Health prober for validating config endpoints
#[derive(Debug, Clone, Default)]
pub struct Prober {
    config: ProberConfig,
}

impl Prober {
    /// Create a new prober with default configuration
    pub fn new() -> Self {
        Self {
            config: ProberConfig::default(),
        }
    }

    /// Create a new prober with custom configuration
    pub fn with_config(config: ProberConfig) -> Self {
        Self { config }
    }

    /// Probe a single config with a timed TCP connect
    pub async fn probe(&self, record: &ConfigRecord) -> ProbeResult {
        let start = Instant::now();

        match tokio::time::timeout(
            self.config.timeout,
            TcpStream::connect((record.host.as_str(), record.port)),
        )
        .await
        {
            Ok(Ok(_stream)) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(endpoint = %record.endpoint(), latency_ms = elapsed, "reachable");
                ProbeResult::reachable(record.clone(), elapsed)
            }
            Ok(Err(e)) => ProbeResult::unreachable(record.clone(), e.to_string()),
            Err(_) => ProbeResult::timeout(record.clone()),
        }
    }

    /// Probe multiple configs concurrently
    pub async fn probe_all(&self, records: Vec<ConfigRecord>) -> Vec<ProbeResult> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));

        stream::iter(records)
            .map(|record| {
                let sem = Arc::clone(&semaphore);
                let prober = self.clone();
                async move {
                    // Semaphore acquire only fails if the semaphore is closed,
                    // which won't happen here since we own the Arc and keep it
                    // alive for the duration of the probe operation.
                    let _permit = sem
                        .acquire()
                        .await
                        .expect("Semaphore closed unexpectedly");
                    prober.probe(&record).await
                }
            })
            .buffer_unordered(self.config.concurrency)
            .collect::<Vec<_>>()
            .await
    }

    /// Probe configs and return only the reachable ones, fastest first
    pub async fn probe_and_rank(&self, records: Vec<ConfigRecord>) -> Vec<ProbeResult> {
        let results = self.probe_all(records).await;
        rank_reachable(results)
    }
}

/// Keep reachable results and order them by latency ascending, breaking
/// ties by host then port so output ordering is deterministic
pub fn rank_reachable(results: Vec<ProbeResult>) -> Vec<ProbeResult> {
    let mut reachable: Vec<ProbeResult> =
        results.into_iter().filter(|r| r.is_reachable()).collect();

    reachable.sort_by(|a, b| {
        a.latency_ms
            .cmp(&b.latency_ms)
            .then_with(|| a.record.host.cmp(&b.record.host))
            .then_with(|| a.record.port.cmp(&b.record.port))
    });

    reachable
}
