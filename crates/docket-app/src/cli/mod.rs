use std::path::PathBuf;

use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand};

use crate::scrape::PaginationPolicy;

pub mod validators;

use validators::{validate_max_pages, validate_months, validate_query};

/// Top-level CLI entry point.
#[derive(Debug, Default, Parser)]
#[command(
    name = "docket",
    version,
    author,
    about = "Court docket search scraper with CSV export"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
    /// Increase logging verbosity (-v, -vv, -vvv).
    #[arg(global = true, short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn print_help() {
        let mut cmd = Cli::command();
        let _ = cmd.print_help();
        println!();
    }
}

/// Supported subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Search the docket, fetch every case's proceedings and write the CSV export.
    Scrape(ScrapeArgs),
    /// Compare docket ids between two JSON snapshots.
    Compare(CompareArgs),
    /// Re-export a JSON snapshot as CSV.
    Export(ExportArgs),
}

/// Run searches against the docket form.
#[derive(Debug, Default, Args)]
pub struct ScrapeArgs {
    /// Search text; repeat for several queries. Replaces the generated month queries.
    #[arg(long = "query", short = 'q', value_parser = validate_query)]
    pub queries: Vec<String>,
    /// Generate one query per calendar month, counting back from the current one.
    #[arg(long, value_parser = validate_months)]
    pub months: Option<usize>,
    /// Directory for `scotus_details.csv`.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,
    /// Also write the enriched records as a JSON snapshot.
    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,
    /// Stop each query after this many result pages.
    #[arg(long, value_parser = validate_max_pages)]
    pub max_pages: Option<usize>,
    /// Lower bound of the delay before each next-page request.
    #[arg(long)]
    pub min_delay_ms: Option<u64>,
    /// Upper bound of the delay before each next-page request.
    #[arg(long)]
    pub max_delay_ms: Option<u64>,
    /// Signal used to decide whether another result page exists.
    #[arg(long, value_enum)]
    pub pagination: Option<PaginationPolicy>,
    /// Search form URL.
    #[arg(long)]
    pub url: Option<String>,
}

/// Compare two snapshots by docket id.
#[derive(Debug, Args)]
pub struct CompareArgs {
    #[arg(value_name = "A")]
    pub a: PathBuf,
    #[arg(value_name = "B")]
    pub b: PathBuf,
}

/// Flatten a snapshot into the CSV artifact.
#[derive(Debug, Args)]
pub struct ExportArgs {
    #[arg(value_name = "SNAPSHOT")]
    pub input: PathBuf,
    /// Directory for `scotus_details.csv`.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,
}
