use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use tracing::{error, info};

use farmacie::environment::AppConfig;
use farmacie::logging;
use farmacie::RunSummary;

#[derive(Parser)]
#[clap(
    name = "farmacie",
    about = "Aggregate the pharmacy duty rosters of a region into one dataset"
)]
struct Cli {
    /// Region or province page to start from
    #[clap(long)]
    root_url: Option<String>,

    /// Site root used to build municipality page URLs
    #[clap(long)]
    base_url: Option<String>,

    /// Geocode cache file
    #[clap(long)]
    cache: Option<PathBuf>,

    /// Results file
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// Nominatim search endpoint
    #[clap(long)]
    geocoder_url: Option<String>,

    /// Extra attempts for each page before giving up
    #[clap(short, long)]
    retries: Option<usize>,

    /// Seconds to wait between attempts
    #[clap(long)]
    retry_delay: Option<u64>,

    /// Minimum milliseconds between geocoding requests
    #[clap(long)]
    geocode_interval: Option<u64>,
}

impl Cli {
    fn apply(self, config: &mut AppConfig) {
        if let Some(root_url) = self.root_url {
            config.root_url = root_url;
        }
        if let Some(base_url) = self.base_url {
            config.base_url = base_url;
        }
        if let Some(cache) = self.cache {
            config.cache_path = cache;
        }
        if let Some(output) = self.output {
            config.results_path = output;
        }
        if let Some(geocoder_url) = self.geocoder_url {
            config.geocoder_url = geocoder_url;
        }
        if let Some(retries) = self.retries {
            config.fetch_retries = retries;
        }
        if let Some(delay) = self.retry_delay {
            config.retry_delay_secs = delay;
        }
        if let Some(interval) = self.geocode_interval {
            config.geocode_interval_ms = interval;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::configure_logging();

    let mut config = AppConfig::from_env();
    Cli::parse().apply(&mut config);
    info!("Starting with {:?}", config);

    match farmacie::run(&config).await {
        Ok(summary) => {
            print_summary(&summary, &config);
            Ok(())
        }
        Err(e) => {
            error!("Aggregation failed, nothing was written: {:#}", e);
            Err(e)
        }
    }
}

fn print_summary(summary: &RunSummary, config: &AppConfig) {
    let counts = &summary.diagnostics;

    println!("\n{}", "═".repeat(60).bright_blue());
    println!("{}", "RUN SUMMARY".bright_blue());
    println!("{}", "═".repeat(60).bright_blue());
    println!("{}: {}", "Municipalities".bright_blue(), summary.municipalities);
    println!("{}: {}", "Pharmacies".bright_blue(), summary.pharmacies);
    println!("{}: {}", "Openings".bright_blue(), summary.openings);
    println!(
        "{}: {} hits, {} misses, {} failures",
        "Geocoding".bright_blue(),
        counts.cache_hits,
        counts.cache_misses,
        counts.geocode_failures
    );
    println!("{}: {}", "Cached positions".bright_blue(), summary.cached_positions);

    let conflicts = counts.conflicts.to_string();
    println!(
        "{}: {}",
        "Conflicts".bright_blue(),
        if counts.conflicts > 0 {
            conflicts.bright_yellow()
        } else {
            conflicts.bright_green()
        }
    );
    println!("{}: {}", "Missing values".bright_blue(), counts.missing_values);
    println!("{}: {}", "Duplicates on page".bright_blue(), counts.duplicates);
    println!("{}", "─".repeat(60).dimmed());
    println!(
        "Results written to {}, cache to {}",
        config.results_path.display().to_string().bright_white(),
        config.cache_path.display().to_string().bright_white()
    );
}
