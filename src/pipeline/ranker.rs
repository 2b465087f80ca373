//! Ranker/aggregator module
//!
//! Takes latency-ranked probe results and produces the final output sets:
//! renamed links in rank order, region buckets and per-protocol buckets.
//! Each link gets a fresh display name of the form
//! `{flag} {CODE} #{NNN} |{brand} {emoji}` in its percent-encoded fragment.

use crate::pipeline::geo::{region_for_host, GeoLocator};
use crate::pipeline::models::{ProbeResult, RegionBucket};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::seq::SliceRandom;
use std::collections::{BTreeMap, HashMap};

/// Characters kept literal in a link fragment, everything else (including
/// all non-ASCII) is percent-encoded
const FRAGMENT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Fallback brand when settings provide none
const DEFAULT_BRAND: &str = "V2XCore";

/// Fallback emoji when settings provide none
const DEFAULT_EMOJI: &str = "⚡️";

/// Final output sets for one aggregation cycle
#[derive(Debug, Clone, Default)]
pub struct Aggregate {
    /// All named links in rank order
    pub links: Vec<String>,
    /// Region buckets in order of first appearance
    pub regions: Vec<RegionBucket>,
    /// Per-protocol links keyed by URI scheme
    pub protocols: BTreeMap<String, Vec<String>>,
}

impl Aggregate {
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Look up one region bucket by code
    pub fn region(&self, code: &str) -> Option<&RegionBucket> {
        self.regions.iter().find(|b| b.code == code)
    }
}

/// Ranker for naming and grouping surviving configs
pub struct Ranker {
    geo: Option<GeoLocator>,
    brands: Vec<String>,
    emojis: Vec<String>,
}

impl Ranker {
    pub fn new(geo: Option<GeoLocator>, brands: Vec<String>, emojis: Vec<String>) -> Self {
        let brands = if brands.is_empty() {
            vec![DEFAULT_BRAND.to_string()]
        } else {
            brands
        };
        let emojis = if emojis.is_empty() {
            vec![DEFAULT_EMOJI.to_string()]
        } else {
            emojis
        };

        Self { geo, brands, emojis }
    }

    /// Build the output sets from latency-ranked reachable results
    ///
    /// Results are expected in rank order (see `prober::rank_reachable`);
    /// the 1-based rank index becomes part of each config name.
    pub async fn aggregate(&self, ranked: &[ProbeResult]) -> Aggregate {
        let mut aggregate = Aggregate::default();
        let mut region_index: HashMap<String, usize> = HashMap::new();

        for (i, result) in ranked.iter().enumerate() {
            let record = &result.record;
            let region = region_for_host(self.geo.as_ref(), &record.host, record.port).await;

            let name = self.display_name(&region.flag, &region.code, i + 1);
            let link = format!(
                "{}#{}",
                record.link_without_name(),
                utf8_percent_encode(&name, FRAGMENT_ENCODE_SET)
            );

            let bucket_idx = *region_index.entry(region.code.clone()).or_insert_with(|| {
                aggregate.regions.push(RegionBucket::new(region.code.clone()));
                aggregate.regions.len() - 1
            });
            aggregate.regions[bucket_idx].push(link.clone());

            aggregate
                .protocols
                .entry(record.protocol.scheme().to_string())
                .or_default()
                .push(link.clone());

            aggregate.links.push(link);
        }

        aggregate
    }

    fn display_name(&self, flag: &str, code: &str, rank: usize) -> String {
        let mut rng = rand::thread_rng();
        // Both lists are guaranteed non-empty by the constructor
        let brand = self
            .brands
            .choose(&mut rng)
            .map(String::as_str)
            .unwrap_or(DEFAULT_BRAND);
        let emoji = self
            .emojis
            .choose(&mut rng)
            .map(String::as_str)
            .unwrap_or(DEFAULT_EMOJI);

        format!("{} {} #{:03} |{} {}", flag, code, rank, brand, emoji)
    }
}
