use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::ValueEnum;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::currency::{ExchangeTable, MAX_MYR, MIN_MYR};
use crate::models::RegionTarget;

/// Listings per search results page; the offset parameter moves in these steps.
pub const PAGE_SIZE: usize = 25;

pub const DEFAULT_BASE_URL: &str = "https://www.booking.com/searchresults.html";
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
pub const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";
pub const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

pub const IMAGE_SENTINEL: &str = "https://default-hotel-image.com";
pub const HIGH_RES_IMAGE_SENTINEL: &str = "https://default-hotel-image.com/high-res.jpg";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    /// 10k records over five regions, prices kept in local currency
    Standard,
    /// 50k records over thirteen regions, MYR prices, image upgrade, batch files
    Extended,
}

/// How values are synthesized for fields missing from a listing card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    /// Uniform random value from the configured range
    Random,
    /// Always the lower bound of the configured range
    Sentinel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: u64,
    pub max: u64,
}

impl PriceRange {
    pub const fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    pub fn pick<R: Rng>(&self, policy: FallbackPolicy, rng: &mut R) -> u64 {
        match policy {
            FallbackPolicy::Sentinel => self.min,
            FallbackPolicy::Random if self.max <= self.min => self.min,
            FallbackPolicy::Random => rng.gen_range(self.min..=self.max),
        }
    }
}

/// Fallback price ranges. `unparseable` applies when the price element exists
/// but holds no digits and is expressed in the region's currency, so it still
/// goes through conversion. `missing` applies when there is no price element
/// and is already in the output currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceFallbacks {
    pub unparseable: PriceRange,
    pub missing: PriceRange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestHeaders {
    pub user_agent: String,
    pub accept_language: String,
    pub accept: Option<String>,
}

impl Default for RequestHeaders {
    fn default() -> Self {
        Self {
            user_agent: USER_AGENT.to_string(),
            accept_language: ACCEPT_LANGUAGE.to_string(),
            accept: Some(ACCEPT.to_string()),
        }
    }
}

/// Capped exponential backoff for failed page fetches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 5_000,
            max_backoff_ms: 60_000,
            max_retries: 8,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u64.checked_shl(retry.saturating_sub(1)).unwrap_or(u64::MAX);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

/// Pause between successful page fetches, drawn uniformly from `[min, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDelay {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Default for PageDelay {
    fn default() -> Self {
        Self {
            min_ms: 2_000,
            max_ms: 5_000,
        }
    }
}

impl PageDelay {
    pub fn none() -> Self {
        Self { min_ms: 0, max_ms: 0 }
    }

    pub fn pick<R: Rng>(&self, rng: &mut R) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rng.gen_range(self.min_ms..self.max_ms))
    }
}

/// Everything a run needs. Deserialized from a JSON file with `--config`;
/// missing keys take the extended preset's values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    pub base_url: String,
    pub checkin: NaiveDate,
    pub checkout: NaiveDate,
    pub regions: Vec<RegionTarget>,
    pub headers: RequestHeaders,
    /// Request timeout in seconds; `None` waits indefinitely.
    pub timeout_secs: Option<u64>,
    pub retry: RetryPolicy,
    pub page_delay: PageDelay,
    pub price_fallback: PriceFallbacks,
    pub fallback_policy: FallbackPolicy,
    pub convert_currency: bool,
    pub exchange_rates: ExchangeTable,
    pub upgrade_images: bool,
    pub image_sentinel: String,
    pub batch_size: Option<usize>,
    pub batch_dir: PathBuf,
    pub output: PathBuf,
    pub seed: Option<u64>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self::extended()
    }
}

impl ScrapeConfig {
    pub fn preset(preset: Preset) -> Self {
        match preset {
            Preset::Standard => Self::standard(),
            Preset::Extended => Self::extended(),
        }
    }

    /// Five regions sharing 10,000 records: 15% origin country, the rest split
    /// 30/25/25/20 between the others.
    pub fn standard() -> Self {
        Self {
            regions: standard_regions(10_000),
            headers: RequestHeaders {
                accept: None,
                ..RequestHeaders::default()
            },
            timeout_secs: None,
            price_fallback: PriceFallbacks {
                unparseable: PriceRange::new(50, 500),
                missing: PriceRange::new(50, 500),
            },
            convert_currency: false,
            upgrade_images: false,
            image_sentinel: IMAGE_SENTINEL.to_string(),
            batch_size: None,
            output: PathBuf::from("hotel_data.json"),
            ..Self::extended()
        }
    }

    pub fn extended() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            checkin: date(2025, 4, 1),
            checkout: date(2025, 4, 2),
            regions: extended_regions(),
            headers: RequestHeaders::default(),
            timeout_secs: Some(10),
            retry: RetryPolicy::default(),
            page_delay: PageDelay::default(),
            price_fallback: PriceFallbacks {
                unparseable: PriceRange::new(10, 30_000),
                missing: PriceRange::new(MIN_MYR, MAX_MYR),
            },
            fallback_policy: FallbackPolicy::Random,
            convert_currency: true,
            exchange_rates: ExchangeTable::default(),
            upgrade_images: true,
            image_sentinel: HIGH_RES_IMAGE_SENTINEL.to_string(),
            batch_size: Some(5_000),
            batch_dir: PathBuf::from("hotel_batches"),
            output: PathBuf::from("hotel_data_50k.json"),
            seed: None,
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&text)
            .context(format!("Failed to parse config file: {}", path.display()))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn total_target(&self) -> usize {
        self.regions.iter().map(|r| r.target).sum()
    }

    /// Scales every region target so they sum to roughly `total`, keeping
    /// each region's share. Integer division rounds each target down.
    pub fn rescale(&mut self, total: usize) {
        let current = self.total_target() as u64;
        if current == 0 {
            return;
        }
        for region in &mut self.regions {
            region.target = (region.target as u64 * total as u64 / current) as usize;
        }
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

fn standard_regions(total: usize) -> Vec<RegionTarget> {
    let origin = total * 15 / 100;
    let others = total * 85 / 100;
    vec![
        RegionTarget::new("Malaysia", origin, "MYR").origin(),
        RegionTarget::new("United States", others * 30 / 100, "USD"),
        RegionTarget::new("United Kingdom", others * 25 / 100, "GBP"),
        RegionTarget::new("Spain", others * 25 / 100, "EUR"),
        RegionTarget::new("Dubai", others * 20 / 100, "AED"),
    ]
}

fn extended_regions() -> Vec<RegionTarget> {
    vec![
        RegionTarget::new("Malaysia", 7_500, "MYR").origin(),
        RegionTarget::new("United States", 6_000, "USD"),
        RegionTarget::new("United Kingdom", 5_000, "GBP"),
        RegionTarget::new("Spain", 5_000, "EUR"),
        RegionTarget::new("Dubai", 4_000, "AED"),
        RegionTarget::new("Japan", 4_000, "JPY"),
        RegionTarget::new("Singapore", 3_500, "SGD"),
        RegionTarget::new("Thailand", 3_500, "THB"),
        RegionTarget::new("India", 3_000, "INR"),
        RegionTarget::new("France", 3_000, "EUR"),
        RegionTarget::new("Italy", 2_500, "EUR"),
        RegionTarget::new("Germany", 2_500, "EUR"),
        RegionTarget::new("Australia", 2_000, "AUD"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn standard_preset_splits_ten_thousand() {
        let config = ScrapeConfig::standard();
        let targets: Vec<usize> = config.regions.iter().map(|r| r.target).collect();
        assert_eq!(targets, vec![1500, 2550, 2125, 2125, 1700]);
        assert_eq!(config.total_target(), 10_000);
        assert!(config.regions[0].is_origin_country);
        assert!(!config.convert_currency);
        assert_eq!(config.batch_size, None);
        assert_eq!(config.output, PathBuf::from("hotel_data.json"));
    }

    #[test]
    fn extended_preset_totals_fifty_thousand() {
        let config = ScrapeConfig::extended();
        assert_eq!(config.total_target(), 50_000);
        assert_eq!(config.regions.len(), 13);
        assert_eq!(config.regions.iter().filter(|r| r.is_origin_country).count(), 1);
        assert_eq!(config.batch_size, Some(5_000));
        assert_eq!(config.timeout(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn rescale_keeps_shares() {
        let mut config = ScrapeConfig::standard();
        config.rescale(1_000);
        let targets: Vec<usize> = config.regions.iter().map(|r| r.target).collect();
        assert_eq!(targets, vec![150, 255, 212, 212, 170]);
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        let retry = RetryPolicy {
            initial_backoff_ms: 5_000,
            max_backoff_ms: 30_000,
            max_retries: 10,
        };
        assert_eq!(retry.backoff(1), Duration::from_secs(5));
        assert_eq!(retry.backoff(2), Duration::from_secs(10));
        assert_eq!(retry.backoff(3), Duration::from_secs(20));
        assert_eq!(retry.backoff(4), Duration::from_secs(30));
        assert_eq!(retry.backoff(200), Duration::from_secs(30));
    }

    #[test]
    fn page_delay_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let delay = PageDelay::default();
        for _ in 0..100 {
            let d = delay.pick(&mut rng);
            assert!(d >= Duration::from_secs(2) && d < Duration::from_secs(5));
        }
        assert_eq!(PageDelay::none().pick(&mut rng), Duration::ZERO);
    }

    #[test]
    fn price_range_policies() {
        let mut rng = StdRng::seed_from_u64(1);
        let range = PriceRange::new(50, 500);
        assert_eq!(range.pick(FallbackPolicy::Sentinel, &mut rng), 50);
        for _ in 0..100 {
            let value = range.pick(FallbackPolicy::Random, &mut rng);
            assert!((50..=500).contains(&value));
        }
    }

    #[test]
    fn partial_json_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "regions": [{"name": "Malaysia", "target": 30, "is_origin_country": true, "currency": "MYR"}],
                "batch_size": 10,
                "checkin": "2025-06-01",
                "fallback_policy": "sentinel"
            }"#,
        )
        .unwrap();

        let config = ScrapeConfig::from_json_file(&path).unwrap();
        assert_eq!(config.regions.len(), 1);
        assert_eq!(config.batch_size, Some(10));
        assert_eq!(config.checkin, date(2025, 6, 1));
        assert_eq!(config.fallback_policy, FallbackPolicy::Sentinel);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }
}
