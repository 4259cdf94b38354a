pub mod cli;
pub mod compare;
pub mod config;
pub mod error;
pub mod export;
pub mod scrape;
