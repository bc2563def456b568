use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::debug_eprintln;
use crate::errors::{ExtractError, Result, ScrapeError};
use crate::fetcher::ImageProbe;

const CARD: &str = r#"div[data-testid="property-card"]"#;
const NAME: &str = r#"div[data-testid="title"]"#;
const DESCRIPTION: &str = r#"div[data-testid="property-card-unit-configuration"]"#;
const PRICE: &str = r#"span[data-testid="price-and-discounted-price"]"#;
const IMAGE: &str = r#"img[data-testid="image"]"#;

/// Compiled selectors for the structural markers of a listing card.
pub struct CardSelectors {
    card: Selector,
    name: Selector,
    description: Selector,
    price: Selector,
    image: Selector,
}

impl CardSelectors {
    pub fn new() -> Result<Self> {
        Ok(Self {
            card: parse_selector(CARD)?,
            name: parse_selector(NAME)?,
            description: parse_selector(DESCRIPTION)?,
            price: parse_selector(PRICE)?,
            image: parse_selector(IMAGE)?,
        })
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| ScrapeError::Selector(format!("{}: {:?}", selector, e)))
}

/// What one card holds, before any fallback is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawListing {
    pub name: String,
    pub description: Option<String>,
    pub price_text: Option<String>,
    pub image_src: Option<String>,
}

/// Lazily walks the listing cards of a page in document order. Each item is
/// independent: a card without a title yields an error and the rest continue.
pub fn extract_listings<'a>(
    document: &'a Html,
    selectors: &'a CardSelectors,
) -> impl Iterator<Item = std::result::Result<RawListing, ExtractError>> + 'a {
    document
        .select(&selectors.card)
        .map(move |card| extract_card(card, selectors))
}

pub fn count_cards(document: &Html, selectors: &CardSelectors) -> usize {
    document.select(&selectors.card).count()
}

pub fn extract_card(
    card: ElementRef<'_>,
    selectors: &CardSelectors,
) -> std::result::Result<RawListing, ExtractError> {
    let name = card
        .select(&selectors.name)
        .next()
        .map(element_text)
        .ok_or(ExtractError::MissingName)?;

    let description = card.select(&selectors.description).next().map(element_text);
    let price_text = card.select(&selectors.price).next().map(element_text);
    let image_src = card
        .select(&selectors.image)
        .next()
        .and_then(|img| img.value().attr("src"))
        .map(str::to_string);

    Ok(RawListing {
        name,
        description,
        price_text,
        image_src,
    })
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Digits of a price label as a number, e.g. `"MYR 1,234"` -> `1234`.
/// `None` when there are no digits or the number does not fit.
pub fn price_digits(text: &str) -> Option<u64> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

fn size_param() -> &'static Regex {
    static SIZE: OnceLock<Regex> = OnceLock::new();
    SIZE.get_or_init(|| Regex::new(r"\bsz=300\b").unwrap())
}

/// Asks the CDN for the 1024px rendition instead of the 300px thumbnail.
/// URLs already pointing at a `max` or `square` rendition are left alone.
pub fn upgrade_image_url(url: &str) -> String {
    if url.contains("max") || url.contains("square") {
        return url.to_string();
    }
    size_param().replace_all(url, "sz=1024").into_owned()
}

/// Upgraded image URL if the probe confirms it serves an image, otherwise
/// `sentinel`. Probe errors never propagate.
pub fn resolve_image<P: ImageProbe + ?Sized>(probe: &P, src: &str, sentinel: &str) -> String {
    let candidate = upgrade_image_url(src);
    match probe.is_image(&candidate) {
        Ok(true) => candidate,
        Ok(false) => sentinel.to_string(),
        Err(e) => {
            debug_eprintln!("Image probe failed for {}: {}", candidate, e);
            sentinel.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <div data-testid="property-card">
            <div data-testid="title"> Grand Hotel </div>
            <div data-testid="property-card-unit-configuration">Deluxe King Room</div>
            <span data-testid="price-and-discounted-price">MYR&nbsp;1,234</span>
            <img data-testid="image" src="https://cf.example/xdata/images/hotel/square200/1.jpg?sz=300&k=a">
          </div>
          <div data-testid="property-card">
            <span data-testid="price-and-discounted-price">MYR 99</span>
          </div>
          <div data-testid="property-card">
            <div data-testid="title">Bare Inn</div>
          </div>
        </body></html>
    "#;

    struct FixedProbe(std::result::Result<bool, u16>);

    impl ImageProbe for FixedProbe {
        fn is_image(&self, url: &str) -> Result<bool> {
            self.0.map_err(|status| ScrapeError::Status {
                status,
                url: url.to_string(),
            })
        }
    }

    #[test]
    fn extracts_cards_in_order() {
        let document = Html::parse_document(PAGE);
        let selectors = CardSelectors::new().unwrap();
        assert_eq!(count_cards(&document, &selectors), 3);

        let listings: Vec<_> = extract_listings(&document, &selectors).collect();
        assert_eq!(listings.len(), 3);

        let first = listings[0].as_ref().unwrap();
        assert_eq!(first.name, "Grand Hotel");
        assert_eq!(first.description.as_deref(), Some("Deluxe King Room"));
        assert_eq!(first.price_text.as_deref().and_then(price_digits), Some(1234));
        assert!(first.image_src.as_deref().unwrap().contains("sz=300"));

        assert_eq!(listings[1], Err(ExtractError::MissingName));

        let bare = listings[2].as_ref().unwrap();
        assert_eq!(bare.name, "Bare Inn");
        assert_eq!(bare.description, None);
        assert_eq!(bare.price_text, None);
        assert_eq!(bare.image_src, None);
    }

    #[test]
    fn page_without_cards_is_empty() {
        let document = Html::parse_document("<html><body><p>blocked</p></body></html>");
        let selectors = CardSelectors::new().unwrap();
        assert_eq!(count_cards(&document, &selectors), 0);
        assert_eq!(extract_listings(&document, &selectors).count(), 0);
    }

    #[test]
    fn price_digits_strips_everything_else() {
        assert_eq!(price_digits("RM 12,345"), Some(12345));
        assert_eq!(price_digits("US$ 1.099"), Some(1099));
        assert_eq!(price_digits("Sold out"), None);
        assert_eq!(price_digits(""), None);
        assert_eq!(price_digits("999999999999999999999999"), None);
    }

    #[test]
    fn upgrades_thumbnail_size_only() {
        assert_eq!(
            upgrade_image_url("https://cf.example/a.jpg?sz=300&k=1"),
            "https://cf.example/a.jpg?sz=1024&k=1"
        );
        assert_eq!(
            upgrade_image_url("https://cf.example/a.jpg?sz=3000"),
            "https://cf.example/a.jpg?sz=3000"
        );
        assert_eq!(
            upgrade_image_url("https://cf.example/max500/a.jpg?sz=300"),
            "https://cf.example/max500/a.jpg?sz=300"
        );
        assert_eq!(
            upgrade_image_url("https://cf.example/square200/a.jpg?sz=300"),
            "https://cf.example/square200/a.jpg?sz=300"
        );
    }

    #[test]
    fn resolve_image_falls_back_to_sentinel() {
        let src = "https://cf.example/a.jpg?sz=300";
        assert_eq!(
            resolve_image(&FixedProbe(Ok(true)), src, "fallback"),
            "https://cf.example/a.jpg?sz=1024"
        );
        assert_eq!(resolve_image(&FixedProbe(Ok(false)), src, "fallback"), "fallback");
        assert_eq!(resolve_image(&FixedProbe(Err(404)), src, "fallback"), "fallback");
    }
}
