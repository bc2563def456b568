use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use hotelscrape::config::{FallbackPolicy, Preset, ScrapeConfig};
use hotelscrape::fetcher::HttpFetcher;
use hotelscrape::pipeline::Pipeline;
use hotelscrape::tui::ScrapeProgress;
use hotelscrape::{debug, storage};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Hotelscrape - Hotel listing scraper")]
struct Args {
    /// Run preset: standard (10k records, local currency) or extended (50k records, MYR, batches)
    #[clap(short, long, value_enum, default_value = "extended")]
    preset: Preset,

    /// JSON config file; replaces the preset, missing keys use extended defaults
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Path to the combined JSON output file
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// Directory for per-region batch files
    #[clap(long)]
    batch_dir: Option<PathBuf>,

    /// Records per batch file
    #[clap(long)]
    batch_size: Option<usize>,

    /// Disable batch files
    #[clap(long)]
    no_batches: bool,

    /// Total records to collect; region targets are rescaled by their shares
    #[clap(short, long)]
    total: Option<usize>,

    /// Seed for delays and fallback values
    #[clap(long)]
    seed: Option<u64>,

    /// Use the lower bound of each fallback range instead of a random value
    #[clap(long)]
    deterministic_fallbacks: bool,

    /// Also write a CSV report with formatted prices
    #[clap(long)]
    csv: Option<PathBuf>,

    /// Enable debug output
    #[clap(short, long)]
    debug: bool,
}

fn build_config(args: &Args) -> Result<ScrapeConfig> {
    let mut config = match &args.config {
        Some(path) => ScrapeConfig::from_json_file(path)?,
        None => ScrapeConfig::preset(args.preset),
    };

    if let Some(output) = &args.output {
        config.output = output.clone();
    }
    if let Some(dir) = &args.batch_dir {
        config.batch_dir = dir.clone();
    }
    if let Some(size) = args.batch_size {
        config.batch_size = Some(size);
    }
    if args.no_batches {
        config.batch_size = None;
    }
    if let Some(total) = args.total {
        config.rescale(total);
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if args.deterministic_fallbacks {
        config.fallback_policy = FallbackPolicy::Sentinel;
    }

    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();
    debug::set_debug(args.debug);

    println!("Hotelscrape - Hotel Listing Scraper");
    println!("===================================");

    let config = build_config(&args)?;
    let target_total = config.total_target();
    println!(
        "Scraping {} regions for {} records into {}",
        config.regions.len(),
        target_total,
        config.output.display()
    );

    let fetcher = HttpFetcher::new(&config)?;
    let mut pipeline = Pipeline::new(&config, &fetcher, &fetcher)?
        .with_progress(ScrapeProgress::new(config.regions.len()));
    let report = pipeline.run()?;

    let records = report.all_records();
    storage::save_records(&records, &config.output)?;
    if let Some(csv) = &args.csv {
        storage::export_csv(&records, csv)?;
    }

    if let Some(progress) = pipeline.progress() {
        progress.show_summary(&report, target_total)?;
    }
    for failed in report.failed_regions() {
        eprintln!(
            "Region {} stopped early after {} pages with {}/{} records",
            failed.region.name,
            failed.pages_fetched,
            failed.records.len(),
            failed.region.target
        );
    }
    if let Some(size) = config.batch_size {
        println!(
            "Data saved in batches of {} records in {} and as a single file in {}",
            size,
            config.batch_dir.display(),
            config.output.display()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_preset() {
        let args = Args::parse_from([
            "hotelscrape",
            "--preset",
            "standard",
            "--total",
            "20000",
            "--batch-size",
            "10",
            "--seed",
            "3",
            "--deterministic-fallbacks",
        ]);
        let config = build_config(&args).unwrap();
        assert_eq!(config.total_target(), 20_000);
        assert_eq!(config.batch_size, Some(10));
        assert_eq!(config.seed, Some(3));
        assert_eq!(config.fallback_policy, FallbackPolicy::Sentinel);
        assert!(!config.convert_currency);
    }

    #[test]
    fn no_batches_wins() {
        let args = Args::parse_from(["hotelscrape", "--batch-size", "10", "--no-batches"]);
        assert_eq!(build_config(&args).unwrap().batch_size, None);
    }
}
