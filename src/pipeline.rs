use std::path::PathBuf;
use std::thread;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use scraper::Html;

use crate::config::ScrapeConfig;
use crate::currency::CurrencyNormalizer;
use crate::extractor::{self, CardSelectors, RawListing};
use crate::fetcher::{self, ImageProbe, PageSource};
use crate::models::{HotelRecord, Price, RegionTarget};
use crate::storage::BatchWriter;
use crate::tui::ScrapeProgress;
use crate::{debug_println, region_eprintln};

/// How a region's collection loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionOutcome {
    TargetReached,
    /// A page came back without listing cards; the count may be short.
    Exhausted,
    /// Page fetches kept failing past the retry ceiling.
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegionState {
    Collecting,
    Done,
}

#[derive(Debug, Clone)]
pub struct RegionReport {
    pub region: RegionTarget,
    pub records: Vec<HotelRecord>,
    pub outcome: RegionOutcome,
    pub pages_fetched: usize,
    pub skipped: usize,
    pub batch_files: Vec<PathBuf>,
}

impl RegionReport {
    pub fn average_price(&self) -> Option<Price> {
        let first = self.records.first()?;
        let sum: u64 = self.records.iter().map(|r| r.price.amount).sum();
        Some(Price::new(
            sum / self.records.len() as u64,
            first.price.currency.clone(),
        ))
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub regions: Vec<RegionReport>,
}

impl RunReport {
    pub fn total(&self) -> usize {
        self.regions.iter().map(|r| r.records.len()).sum()
    }

    pub fn origin_country_count(&self) -> usize {
        self.regions
            .iter()
            .flat_map(|r| &r.records)
            .filter(|r| r.is_origin_country)
            .count()
    }

    /// All records in region order, then append order within each region.
    pub fn all_records(&self) -> Vec<HotelRecord> {
        self.regions
            .iter()
            .flat_map(|r| r.records.iter().cloned())
            .collect()
    }

    pub fn failed_regions(&self) -> impl Iterator<Item = &RegionReport> {
        self.regions
            .iter()
            .filter(|r| matches!(r.outcome, RegionOutcome::Failed(_)))
    }
}

/// Drives the fetch, extract and accumulate loop for each configured region.
pub struct Pipeline<'a, S: PageSource + ?Sized, P: ImageProbe + ?Sized> {
    config: &'a ScrapeConfig,
    source: &'a S,
    probe: &'a P,
    selectors: CardSelectors,
    normalizer: CurrencyNormalizer,
    batches: Option<BatchWriter>,
    rng: StdRng,
    progress: Option<ScrapeProgress>,
}

impl<'a, S: PageSource + ?Sized, P: ImageProbe + ?Sized> Pipeline<'a, S, P> {
    pub fn new(config: &'a ScrapeConfig, source: &'a S, probe: &'a P) -> Result<Self> {
        let normalizer = if config.convert_currency {
            CurrencyNormalizer::converting(config.exchange_rates.clone())
        } else {
            CurrencyNormalizer::passthrough()
        };

        let batches = match config.batch_size {
            Some(size) => Some(BatchWriter::new(&config.batch_dir, size)?),
            None => None,
        };

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            config,
            source,
            probe,
            selectors: CardSelectors::new()?,
            normalizer,
            batches,
            rng,
            progress: None,
        })
    }

    pub fn with_progress(mut self, progress: ScrapeProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn progress(&self) -> Option<&ScrapeProgress> {
        self.progress.as_ref()
    }

    pub fn run(&mut self) -> Result<RunReport> {
        let config = self.config;
        let mut report = RunReport::default();
        for region in &config.regions {
            let region_report = self.run_region(region)?;
            if let Some(progress) = self.progress.as_mut() {
                progress.finish_region(&region_report)?;
            }
            report.regions.push(region_report);
        }
        Ok(report)
    }

    /// Collects records for one region until its target is reached, a page
    /// has no listing cards, or fetching gives up. Only I/O errors while
    /// writing batch files are returned as errors.
    pub fn run_region(&mut self, region: &RegionTarget) -> Result<RegionReport> {
        if let Some(progress) = self.progress.as_mut() {
            progress.start_region(region)?;
        }

        let mut records: Vec<HotelRecord> = Vec::new();
        let mut batch_files = Vec::new();
        let mut pages_fetched = 0;
        let mut skipped = 0;
        let mut page = 0;
        let mut outcome = RegionOutcome::TargetReached;
        let mut state = if region.target == 0 {
            RegionState::Done
        } else {
            RegionState::Collecting
        };

        while state == RegionState::Collecting {
            let url = fetcher::search_url(self.config, region, page);
            let body = match fetcher::fetch_with_retry(
                self.source,
                &url,
                &region.name,
                page,
                &self.config.retry,
            ) {
                Ok(body) => body,
                Err(e) => {
                    region_eprintln!(region.name, "Giving up: {}", e);
                    outcome = RegionOutcome::Failed(e.to_string());
                    state = RegionState::Done;
                    continue;
                }
            };
            pages_fetched += 1;

            let document = Html::parse_document(&body);
            let cards = extractor::count_cards(&document, &self.selectors);
            if cards == 0 {
                debug_println!("No more hotels found for {}", region.name);
                outcome = RegionOutcome::Exhausted;
                state = RegionState::Done;
                continue;
            }
            debug_println!("Page {} of {} has {} cards", page, region.name, cards);

            for listing in extractor::extract_listings(&document, &self.selectors) {
                if records.len() >= region.target {
                    break;
                }
                match listing {
                    Ok(raw) => {
                        let record = build_record(
                            self.config,
                            &self.normalizer,
                            self.probe,
                            &mut self.rng,
                            region,
                            raw,
                        );
                        records.push(record);
                        if let Some(batches) = &self.batches {
                            if let Some(path) = batches.on_append(&region.name, &records)? {
                                if let Some(progress) = self.progress.as_mut() {
                                    progress.batch_saved(region, batches.size(), &path)?;
                                }
                                batch_files.push(path);
                            }
                        }
                    }
                    Err(e) => {
                        skipped += 1;
                        region_eprintln!(region.name, "Error processing hotel: {}", e);
                    }
                }
            }

            if let Some(progress) = self.progress.as_mut() {
                progress.page_scraped(region, page, records.len())?;
            }

            if records.len() >= region.target {
                state = RegionState::Done;
            } else {
                thread::sleep(self.config.page_delay.pick(&mut self.rng));
                page += 1;
            }
        }

        records.truncate(region.target);

        if let Some(batches) = &self.batches {
            if let Some(path) = batches.finish(&region.name, &records)? {
                if let Some(progress) = self.progress.as_mut() {
                    progress.batch_saved(region, records.len() % batches.size(), &path)?;
                }
                batch_files.push(path);
            }
        }

        Ok(RegionReport {
            region: region.clone(),
            records,
            outcome,
            pages_fetched,
            skipped,
            batch_files,
        })
    }
}

/// Applies the fallback policy and currency normalization to one card.
pub fn build_record<P: ImageProbe + ?Sized>(
    config: &ScrapeConfig,
    normalizer: &CurrencyNormalizer,
    probe: &P,
    rng: &mut StdRng,
    region: &RegionTarget,
    raw: RawListing,
) -> HotelRecord {
    let RawListing {
        name,
        description,
        price_text,
        image_src,
    } = raw;

    let description =
        description.unwrap_or_else(|| format!("{} is a hotel located in {}", name, region.name));

    let policy = config.fallback_policy;
    let (price, price_estimated) = match price_text.as_deref().map(extractor::price_digits) {
        Some(Some(amount)) => (normalizer.to_price(amount, &region.currency), false),
        Some(None) => {
            let amount = config.price_fallback.unparseable.pick(policy, rng);
            (normalizer.to_price(amount, &region.currency), true)
        }
        None => {
            let amount = config.price_fallback.missing.pick(policy, rng);
            let currency = normalizer.output_currency(&region.currency);
            (Price::new(amount, currency), true)
        }
    };

    let image = match image_src {
        Some(src) if config.upgrade_images => {
            extractor::resolve_image(probe, &src, &config.image_sentinel)
        }
        Some(src) => src,
        None => config.image_sentinel.clone(),
    };

    HotelRecord {
        description,
        name,
        price,
        price_estimated,
        is_origin_country: region.is_origin_country,
        region: Some(region.name.clone()),
        image,
    }
}
