//! Command-line front-end for listing-scraper: job files, exports, and
//! diagnostic observers around the core scraping loop.

pub mod cli;
pub mod config;
pub mod export;
pub mod observers;
