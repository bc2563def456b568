pub mod config;
pub mod currency;
pub mod debug;
pub mod errors;
pub mod extractor;
pub mod fetcher;
pub mod models;
pub mod pipeline;
pub mod storage;
pub mod tui;
