use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use v2sub::{
    pipeline::{
        self, collector, Collector, CollectorConfig, LinkParser, ProbeResult, Prober,
        ProberConfig,
    },
    Settings,
};

/// A subscription aggregator and config health checker
#[derive(Parser)]
#[command(name = "v2sub")]
#[command(about = "A subscription aggregator and config health checker with async multi-probe support")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Settings file path
    #[arg(short, long, default_value = "settings.json")]
    settings: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full aggregation cycle and write subscription artifacts
    Run,
    /// Fetch config lines from the configured sources
    Collect {
        /// Output file for collected lines
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Timeout in seconds for HTTP requests
        #[arg(long, default_value = "30")]
        timeout: u64,
    },
    /// Parse and deduplicate config links from a file
    Parse {
        /// Input file containing config links
        input: PathBuf,
        /// Output file for unique links
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Probe config links from a file and save results
    Probe {
        /// Input file containing config links
        input: PathBuf,
        /// Output file for reachable links (fastest first)
        #[arg(short, long)]
        good: Option<PathBuf>,
        /// Output file for unreachable links
        #[arg(short, long)]
        bad: Option<PathBuf>,
        /// Number of concurrent probes
        #[arg(short = 'n', long, default_value = "200")]
        concurrency: usize,
        /// Timeout in seconds
        #[arg(long, default_value = "5")]
        timeout: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter =
        EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Some(Commands::Run) | None => {
            let settings = Settings::load(&cli.settings)?;
            let summary = pipeline::run_cycle(&settings).await?;

            println!(
                "Sources: {} ok, {} failed",
                summary.sources_ok, summary.sources_failed
            );
            println!(
                "Configs: {} collected, {} parsed, {} unique, {} reachable",
                summary.collected, summary.parsed, summary.unique, summary.reachable
            );
            println!(
                "Finished in {:.2}s, artifacts written to {:?}",
                summary.elapsed.as_secs_f64(),
                settings.out_dir
            );
        }
        Some(Commands::Collect { output, timeout }) => {
            let settings = Settings::load(&cli.settings)?;
            let sources =
                collector::sources_from_lists(&settings.sources.files, &settings.sources.urls);

            let config = CollectorConfig::new().with_timeout(Duration::from_secs(timeout));
            let collector = Collector::with_config(config)?;
            let results = collector.fetch_sources_with_results(&sources).await;

            for result in &results {
                if result.is_success() {
                    println!("Found {} lines from {}", result.lines.len(), result.source);
                } else if let Some(error) = &result.error {
                    eprintln!("Error fetching {}: {}", result.source, error);
                }
            }

            let lines = collector::unique_lines(&results);
            println!("\nTotal unique lines: {}", lines.len());

            if let Some(output_path) = output {
                std::fs::write(&output_path, lines.join("\n"))?;
                println!("Saved collected lines to {:?}", output_path);
            }
        }
        Some(Commands::Parse { input, output }) => {
            let content = std::fs::read_to_string(&input)?;
            let records = LinkParser::parse_lines(&content);
            let parsed = records.len();
            let unique = LinkParser::dedup_records(records);

            println!(
                "Parsed {} configs from {:?}, {} unique",
                parsed,
                input,
                unique.len()
            );

            if let Some(output_path) = output {
                let links: Vec<&str> = unique.iter().map(|r| r.raw.as_str()).collect();
                std::fs::write(&output_path, links.join("\n"))?;
                println!("Saved unique configs to {:?}", output_path);
            } else {
                for record in &unique {
                    println!("{} {}", record.protocol, record.endpoint());
                }
            }
        }
        Some(Commands::Probe {
            input,
            good,
            bad,
            concurrency,
            timeout,
        }) => {
            let content = std::fs::read_to_string(&input)?;
            let records = LinkParser::dedup_records(LinkParser::parse_lines(&content));

            println!("Loaded {} unique configs from {:?}", records.len(), input);
            println!("Probing with {} concurrent probes, timeout: {}s", concurrency, timeout);
            println!();

            let prober = Prober::with_config(
                ProberConfig::new()
                    .with_concurrency(concurrency)
                    .with_timeout(Duration::from_secs(timeout)),
            );
            let results = prober.probe_all(records).await;
            let (good_results, bad_results): (Vec<_>, Vec<_>) =
                results.into_iter().partition(|r| r.is_reachable());
            let good_results = pipeline::prober::rank_reachable(good_results);

            println!(
                "Results: {} reachable, {} unreachable",
                good_results.len(),
                bad_results.len()
            );

            if let Some(good_path) = good {
                save_links(&good_results, &good_path)?;
                println!("Saved {} reachable configs to {:?}", good_results.len(), good_path);
            }

            if let Some(bad_path) = bad {
                save_links(&bad_results, &bad_path)?;
                println!("Saved {} unreachable configs to {:?}", bad_results.len(), bad_path);
            }

            if !good_results.is_empty() {
                println!("\nReachable configs:");
                for result in &good_results {
                    if let Some(latency) = result.latency_ms {
                        println!("  {} ({}ms)", result.record.endpoint(), latency);
                    }
                }
            }
        }
    }

    Ok(())
}

fn save_links(results: &[ProbeResult], path: &Path) -> Result<()> {
    let links: Vec<&str> = results.iter().map(|r| r.record.raw.as_str()).collect();
    std::fs::write(path, links.join("\n"))?;
    Ok(())
}
