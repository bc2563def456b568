use std::thread;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, USER_AGENT};

use crate::config::{RetryPolicy, ScrapeConfig, PAGE_SIZE};
use crate::errors::{Result, ScrapeError};
use crate::models::RegionTarget;
use crate::{debug_println, region_eprintln};

/// Something that can hand back the body of a search results page.
pub trait PageSource {
    fn fetch_page(&self, url: &str) -> Result<String>;
}

/// Checks whether a URL serves an image.
pub trait ImageProbe {
    fn is_image(&self, url: &str) -> Result<bool>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &ScrapeConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, header_value(&config.headers.user_agent)?);
        headers.insert(ACCEPT_LANGUAGE, header_value(&config.headers.accept_language)?);
        if let Some(accept) = &config.headers.accept {
            headers.insert(ACCEPT, header_value(accept)?);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout())
            .build()?;

        Ok(Self { client })
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| ScrapeError::Header(format!("{:?}: {}", value, e)))
}

impl PageSource for HttpFetcher {
    fn fetch_page(&self, url: &str) -> Result<String> {
        debug_println!("Fetching search page: {}", url);

        let response = self.client.get(url).send()?;
        if !response.status().is_success() {
            return Err(ScrapeError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.text()?)
    }
}

impl ImageProbe for HttpFetcher {
    fn is_image(&self, url: &str) -> Result<bool> {
        let response = self.client.head(url).send()?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        debug_println!("Image probe {} -> {:?}", url, content_type);
        Ok(content_type.contains("image"))
    }
}

/// Search URL for `page` (0-based) of a region's results.
pub fn search_url(config: &ScrapeConfig, region: &RegionTarget, page: usize) -> String {
    format!(
        "{}?ss={}&checkin={}&checkout={}&group_adults=2&no_rooms=1&offset={}",
        config.base_url,
        urlencoding::encode(&region.name),
        config.checkin.format("%Y-%m-%d"),
        config.checkout.format("%Y-%m-%d"),
        page * PAGE_SIZE
    )
}

/// Fetches `url`, retrying the same page on failure with the policy's
/// backoff. After `max_retries` retries the region is given up on.
pub fn fetch_with_retry<S: PageSource + ?Sized>(
    source: &S,
    url: &str,
    region: &str,
    page: usize,
    retry: &RetryPolicy,
) -> Result<String> {
    let mut retries = 0;
    loop {
        match source.fetch_page(url) {
            Ok(body) => return Ok(body),
            Err(e) => {
                region_eprintln!(region, "Error fetching page {}: {}", page, e);
                if retries >= retry.max_retries {
                    return Err(ScrapeError::RetriesExhausted {
                        region: region.to_string(),
                        page,
                        attempts: retries + 1,
                        last: e.to_string(),
                    });
                }
                retries += 1;
                let delay = retry.backoff(retries);
                debug_println!("Retry {} for page {} of {} in {:?}", retries, page, region, delay);
                thread::sleep(delay);
            }
        }
    }
}
