use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use std::io;
use std::path::Path;

use crate::currency::format_price;
use crate::models::RegionTarget;
use crate::pipeline::{RegionOutcome, RegionReport, RunReport};

/// Colored progress lines for a scrape run.
pub struct ScrapeProgress {
    regions_done: usize,
    regions_total: usize,
}

impl ScrapeProgress {
    pub fn new(regions_total: usize) -> Self {
        Self {
            regions_done: 0,
            regions_total,
        }
    }

    pub fn start_region(&mut self, region: &RegionTarget) -> io::Result<()> {
        execute!(
            io::stdout(),
            SetForegroundColor(Color::White),
            Print(format!(
                "⏳ [{}/{}] Scraping {} (target {}, {})\n",
                self.regions_done + 1,
                self.regions_total,
                region.name,
                region.target,
                region.currency
            )),
            ResetColor
        )
    }

    pub fn page_scraped(&mut self, region: &RegionTarget, page: usize, collected: usize) -> io::Result<()> {
        let spinner = match page % 4 {
            0 => "⠋",
            1 => "⠙",
            2 => "⠹",
            _ => "⠸",
        };

        execute!(
            io::stdout(),
            SetForegroundColor(Color::DarkGrey),
            Print(format!(
                "  {} Scraped {}/{} hotels from {} - Page {}\n",
                spinner, collected, region.target, region.name, page
            )),
            ResetColor
        )
    }

    pub fn batch_saved(&mut self, region: &RegionTarget, records: usize, path: &Path) -> io::Result<()> {
        execute!(
            io::stdout(),
            SetForegroundColor(Color::Blue),
            Print(format!(
                "  💾 Saved {} records for {} to {}\n",
                records,
                region.name,
                path.display()
            )),
            ResetColor
        )
    }

    pub fn finish_region(&mut self, report: &RegionReport) -> io::Result<()> {
        self.regions_done += 1;

        let (color, icon, detail) = match &report.outcome {
            RegionOutcome::TargetReached => (Color::Green, "✅", "target reached".to_string()),
            RegionOutcome::Exhausted => (Color::Yellow, "⚠", "no more hotels found".to_string()),
            RegionOutcome::Failed(reason) => (Color::Red, "❌", format!("gave up: {}", reason)),
        };

        execute!(
            io::stdout(),
            SetForegroundColor(color),
            Print(format!(
                "{} {}: {}/{} ({}, {} pages, {} skipped)\n",
                icon,
                report.region.name,
                report.records.len(),
                report.region.target,
                detail,
                report.pages_fetched,
                report.skipped
            )),
            ResetColor
        )
    }

    pub fn show_summary(&self, report: &RunReport, target_total: usize) -> io::Result<()> {
        execute!(
            io::stdout(),
            Print("─".repeat(80)),
            Print("\n"),
            SetForegroundColor(Color::Green),
            Print(format!(
                "Successfully scraped {} hotels out of {}\n",
                report.total(),
                target_total
            )),
            ResetColor,
            Print("Breakdown by region:\n"),
        )?;

        for region in &report.regions {
            let color = match region.outcome {
                RegionOutcome::Failed(_) => Color::Red,
                _ if region.records.len() < region.region.target => Color::Yellow,
                _ => Color::White,
            };
            let average = region
                .average_price()
                .map(|p| format!(", avg {}", format_price(&p)))
                .unwrap_or_default();

            execute!(
                io::stdout(),
                SetForegroundColor(color),
                Print(format!(
                    "  {}: {}/{}{}\n",
                    region.region.name,
                    region.records.len(),
                    region.region.target,
                    average
                )),
                ResetColor
            )?;
        }

        execute!(
            io::stdout(),
            SetForegroundColor(Color::DarkGrey),
            Print(format!(
                "Total origin-country hotels: {}\n",
                report.origin_country_count()
            )),
            ResetColor
        )
    }
}
