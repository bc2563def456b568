use serde::{Deserialize, Serialize};

use crate::currency;

/// Amount in whole currency units. Formatting happens at export time only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub amount: u64,
    pub currency: String,
}

impl Price {
    pub fn new(amount: u64, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }
}

/// One scraped listing. Every field is populated, but `description`, `price`
/// and `image` may come from the fallback policy rather than the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotelRecord {
    pub description: String,
    pub name: String,
    pub price: Price,
    /// Set when `price` was synthesized because the card had no usable price.
    #[serde(default)]
    pub price_estimated: bool,
    pub is_origin_country: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub image: String,
}

impl HotelRecord {
    pub fn csv_header() -> [&'static str; 7] {
        [
            "Name",
            "Description",
            "Price",
            "Estimated",
            "Origin Country",
            "Region",
            "Image",
        ]
    }

    pub fn to_csv_record(&self) -> [String; 7] {
        [
            self.name.clone(),
            self.description.clone(),
            currency::format_price(&self.price),
            self.price_estimated.to_string(),
            self.is_origin_country.to_string(),
            self.region.clone().unwrap_or_default(),
            self.image.clone(),
        ]
    }
}

/// One accumulation run: how many records to collect for a search region
/// and which currency its listings are priced in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionTarget {
    pub name: String,
    pub target: usize,
    #[serde(default)]
    pub is_origin_country: bool,
    pub currency: String,
}

impl RegionTarget {
    pub fn new(name: impl Into<String>, target: usize, currency: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target,
            is_origin_country: false,
            currency: currency.into(),
        }
    }

    pub fn origin(mut self) -> Self {
        self.is_origin_country = true;
        self
    }
}
