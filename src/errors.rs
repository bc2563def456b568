use thiserror::Error;

pub type Result<T> = core::result::Result<T, ScrapeError>;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Gave up on page {page} of {region} after {attempts} attempts, last error: {last}")]
    RetriesExhausted {
        region: String,
        page: usize,
        attempts: u32,
        last: String,
    },

    #[error("Invalid selector {0}")]
    Selector(String),

    #[error("Invalid header value {0}")]
    Header(String),
}

/// Failure to read one listing card. Only ever skips that card.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("listing card has no title element")]
    MissingName,
}
