use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::Price;

pub const MYR: &str = "MYR";
pub const MIN_MYR: u64 = 50;
pub const MAX_MYR: u64 = 130_000;

/// Multipliers from a currency code to MYR, with a fallback rate for codes
/// not in the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeTable {
    pub rates: BTreeMap<String, f64>,
    pub default_rate: f64,
}

impl Default for ExchangeTable {
    fn default() -> Self {
        let rates = [
            ("USD", 4.35),
            ("GBP", 5.80),
            ("EUR", 4.90),
            ("AED", 1.18),
            ("JPY", 0.032),
            ("SGD", 3.25),
            ("THB", 0.13),
            ("INR", 0.052),
            ("AUD", 2.95),
        ]
        .into_iter()
        .map(|(code, rate)| (code.to_string(), rate))
        .collect();

        Self {
            rates,
            default_rate: 4.35,
        }
    }
}

impl ExchangeTable {
    pub fn rate(&self, code: &str) -> f64 {
        self.rates.get(code).copied().unwrap_or(self.default_rate)
    }

    /// Converts `raw` to MYR and clamps it into `[MIN_MYR, MAX_MYR]`.
    /// MYR input is only clamped.
    pub fn normalize(&self, raw: u64, code: &str) -> u64 {
        let converted = if code == MYR {
            raw
        } else {
            // `as` truncates toward zero and saturates on overflow
            (raw as f64 * self.rate(code)) as u64
        };
        converted.clamp(MIN_MYR, MAX_MYR)
    }
}

/// `normalize` against the built-in exchange table.
pub fn normalize(raw: u64, code: &str) -> u64 {
    ExchangeTable::default().normalize(raw, code)
}

/// Turns scraped amounts into stored prices. When conversion is off, amounts
/// stay in the region's own currency and are not clamped.
#[derive(Debug, Clone)]
pub struct CurrencyNormalizer {
    table: ExchangeTable,
    convert: bool,
}

impl CurrencyNormalizer {
    pub fn converting(table: ExchangeTable) -> Self {
        Self {
            table,
            convert: true,
        }
    }

    pub fn passthrough() -> Self {
        Self {
            table: ExchangeTable::default(),
            convert: false,
        }
    }

    pub fn output_currency<'a>(&self, source: &'a str) -> &'a str {
        if self.convert {
            MYR
        } else {
            source
        }
    }

    pub fn to_price(&self, raw: u64, source: &str) -> Price {
        let amount = if self.convert {
            self.table.normalize(raw, source)
        } else {
            raw
        };
        Price::new(amount, self.output_currency(source))
    }
}

/// Display form used by reports: `RM 1,234` for ringgit, `USD 1,234` otherwise.
pub fn format_price(price: &Price) -> String {
    let marker = if price.currency == MYR {
        "RM"
    } else {
        price.currency.as_str()
    };
    format!("{} {}", marker, group_thousands(price.amount))
}

fn group_thousands(amount: u64) -> String {
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
