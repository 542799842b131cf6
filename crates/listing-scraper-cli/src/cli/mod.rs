//! CLI subcommand implementations for the listing-scraper binary.

pub mod doctor;
pub mod init_cmd;
pub mod output;
pub mod replay_cmd;
pub mod run;
pub mod scrape_cmd;
