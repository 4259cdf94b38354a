use std::{path::PathBuf, process, time::Duration};

use chrono::Local;
use docket_app::cli::{Cli, Commands, CompareArgs, ExportArgs, ScrapeArgs};
use docket_app::compare::compare_ids;
use docket_app::config::{self, AppConfig};
use docket_app::error::AppError;
use docket_app::export::{read_snapshot, to_csv, write_csv_export, write_snapshot};
use docket_app::scrape::{
    DocketScraper, ResultRecord, ScrapeError, ScrapeEvent, ScrapeSummary, recent_month_queries,
};
use futures_util::stream::{Stream, StreamExt};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing_subscriber::{filter::LevelFilter, fmt};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let log_level = determine_log_level(&cli);
    init_tracing(log_level);

    if let Err(err) = run(cli).await {
        eprintln!("{err}");
        process::exit(1);
    }
}

fn init_tracing(level: LevelFilter) {
    let subscriber = fmt().with_max_level(level).with_target(false).finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::warn!("Tracing subscriber already set; skipping re-initialization.");
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let verbosity = cli.verbose;

    match cli.command {
        Some(Commands::Scrape(args)) => run_scrape(args, verbosity).await?,
        Some(Commands::Compare(args)) => run_compare(args).await?,
        Some(Commands::Export(args)) => run_export(args).await?,
        None => Cli::print_help(),
    }

    Ok(())
}

async fn run_scrape(args: ScrapeArgs, verbosity: u8) -> Result<(), AppError> {
    let cfg = apply_overrides(config::load()?, &args)?;
    let queries = resolve_queries(&args, &cfg, Local::now().date_naive());
    if queries.is_empty() {
        return Err(AppError::Config("no queries to run".to_string()));
    }

    tracing::info!(
        url = %cfg.scrape.endpoint,
        queries = queries.len(),
        max_pages = cfg.scrape.max_pages,
        pagination = ?cfg.scrape.pagination,
        "starting docket scrape"
    );

    let scraper = DocketScraper::http(
        &cfg.scrape.endpoint,
        &cfg.scrape.http_settings(),
        cfg.scrape.options(),
    )?;

    let progress = (verbosity == 0).then(make_progress_bar);
    if let Some(pb) = progress.as_ref() {
        pb.set_length(queries.len() as u64);
    }
    let mut tracker = ProgressTracker::new(progress);
    let mut stream = Box::pin(scraper.scrape_stream(queries));
    let (summary, records) = process_scrape_stream(&mut stream, &mut tracker).await?;
    tracker.finish(&summary);

    if let Some(path) = args.json.as_ref() {
        write_snapshot(path, &records).await?;
        tracing::info!(path = %path.display(), records = records.len(), "wrote json snapshot");
    }

    let csv = to_csv(&records)?;
    match write_csv_export(&cfg.export.output_dir, &csv).await? {
        Some(path) => println!("{}", path.display()),
        None => eprintln!("no records found; nothing exported"),
    }

    tracing::info!(
        queries = summary.queries,
        failed = summary.queries_failed,
        pages = summary.pages,
        records = summary.records,
        entries = summary.entries,
        "docket scrape completed"
    );
    Ok(())
}

fn apply_overrides(mut cfg: AppConfig, args: &ScrapeArgs) -> Result<AppConfig, AppError> {
    if let Some(url) = args.url.as_ref() {
        cfg.scrape.endpoint = url.clone();
    }
    if let Some(max_pages) = args.max_pages {
        cfg.scrape.max_pages = max_pages;
    }
    if let Some(min) = args.min_delay_ms {
        cfg.scrape.min_delay_ms = min;
    }
    if let Some(max) = args.max_delay_ms {
        cfg.scrape.max_delay_ms = max;
    }
    if let Some(policy) = args.pagination {
        cfg.scrape.pagination = policy;
    }
    if let Some(months) = args.months {
        cfg.queries.months_back = months;
    }
    if let Some(dir) = args.output_dir.as_ref() {
        cfg.export.output_dir = dir.clone();
    }

    if cfg.scrape.min_delay_ms > cfg.scrape.max_delay_ms {
        return Err(AppError::Config(format!(
            "min delay {}ms exceeds max delay {}ms",
            cfg.scrape.min_delay_ms, cfg.scrape.max_delay_ms
        )));
    }
    Ok(cfg)
}

/// Explicit queries (CLI, then config) win over generated month queries.
fn resolve_queries(args: &ScrapeArgs, cfg: &AppConfig, today: chrono::NaiveDate) -> Vec<String> {
    if !args.queries.is_empty() {
        return args.queries.clone();
    }
    if !cfg.queries.explicit.is_empty() {
        return cfg.queries.explicit.clone();
    }
    recent_month_queries(today, cfg.queries.months_back, &cfg.queries.template)
}

async fn process_scrape_stream<S>(
    stream: &mut S,
    tracker: &mut ProgressTracker,
) -> Result<(ScrapeSummary, Vec<ResultRecord>), AppError>
where
    S: Stream<Item = Result<ScrapeEvent, ScrapeError>> + Unpin,
{
    while let Some(event) = stream.next().await {
        if let Some(done) = tracker.handle_event(event?) {
            return Ok(done);
        }
    }

    Err(AppError::IncompleteRun)
}

async fn run_compare(args: CompareArgs) -> Result<(), AppError> {
    let a = read_snapshot(&args.a).await?;
    let b = read_snapshot(&args.b).await?;
    let cmp = compare_ids(&a, &b);

    println!("only in {}: {}", args.a.display(), cmp.only_a.len());
    for id in &cmp.only_a {
        println!("  {id}");
    }
    println!("only in {}: {}", args.b.display(), cmp.only_b.len());
    for id in &cmp.only_b {
        println!("  {id}");
    }
    println!("in both: {}", cmp.common.len());
    Ok(())
}

async fn run_export(args: ExportArgs) -> Result<(), AppError> {
    let records = read_snapshot(&args.input).await?;
    let output_dir = match args.output_dir {
        Some(dir) => dir,
        None => config::load()
            .map(|cfg| cfg.export.output_dir)
            .unwrap_or_else(|_| PathBuf::from(".")),
    };
    let csv = to_csv(&records)?;
    match write_csv_export(&output_dir, &csv).await? {
        Some(path) => println!("{}", path.display()),
        None => eprintln!("snapshot has no records; nothing exported"),
    }
    Ok(())
}

struct ProgressTracker {
    progress: Option<ProgressBar>,
}

impl ProgressTracker {
    fn new(progress: Option<ProgressBar>) -> Self {
        Self { progress }
    }

    fn handle_event(&mut self, event: ScrapeEvent) -> Option<(ScrapeSummary, Vec<ResultRecord>)> {
        match event {
            ScrapeEvent::QueryStarted {
                ordinal,
                total,
                query,
            } => {
                if let Some(pb) = self.progress.as_ref() {
                    pb.set_message(format!("query {ordinal}/{total}: {query}"));
                }
            }
            ScrapeEvent::PageFetched {
                query,
                page,
                records,
                has_more,
            } => {
                if let Some(pb) = self.progress.as_ref() {
                    pb.set_message(format!("{query}: page {page} ({records} cases)"));
                } else {
                    tracing::debug!(query = %query, page, records, has_more, "result page fetched");
                }
            }
            ScrapeEvent::DetailFetched { docket, entries } => {
                if let Some(pb) = self.progress.as_ref() {
                    pb.set_message(format!("{docket}: {entries} entries"));
                } else {
                    tracing::debug!(docket = %docket, entries, "proceedings fetched");
                }
            }
            ScrapeEvent::QueryCompleted {
                query,
                pages,
                records,
            } => {
                if let Some(pb) = self.progress.as_ref() {
                    pb.inc(1);
                } else {
                    tracing::info!(query = %query, pages, records, "query finished");
                }
            }
            ScrapeEvent::QueryFailed { query, error } => {
                if let Some(pb) = self.progress.as_ref() {
                    pb.inc(1);
                    pb.println(format!("query failed: {query}: {error}"));
                }
            }
            ScrapeEvent::Completed { summary, records } => return Some((summary, records)),
        }

        None
    }

    fn finish(&self, summary: &ScrapeSummary) {
        if let Some(pb) = self.progress.as_ref() {
            pb.finish_with_message(format!(
                "Completed: {} cases, {} entries over {} pages ({} queries failed)",
                summary.records, summary.entries, summary.pages, summary.queries_failed
            ));
        }
    }
}

fn determine_log_level(cli: &Cli) -> LevelFilter {
    match cli.command.as_ref() {
        Some(Commands::Scrape(_)) => match cli.verbose {
            0 => LevelFilter::OFF,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        },
        Some(Commands::Compare(_)) | Some(Commands::Export(_)) | None => match cli.verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        },
    }
}

fn make_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} [{elapsed_precise}] {pos}/{len} queries {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_draw_target(ProgressDrawTarget::stderr_with_hz(12));
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use docket_app::config::{ExportConfig, QueriesConfig, ScrapeConfig};
    use docket_app::scrape::PaginationPolicy;

    use super::*;

    fn cfg(explicit: Vec<String>) -> AppConfig {
        AppConfig {
            scrape: ScrapeConfig {
                endpoint: "https://court.example/docket.aspx".to_string(),
                detail_url_template: None,
                min_delay_ms: 1_000,
                max_delay_ms: 3_000,
                max_pages: 50,
                timeout_secs: 30,
                retries: 2,
                user_agent: "test".to_string(),
                pagination: PaginationPolicy::PageCount,
            },
            queries: QueriesConfig {
                months_back: 2,
                template: "{month} {year}".to_string(),
                explicit,
            },
            export: ExportConfig {
                output_dir: PathBuf::from("."),
            },
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
    }

    #[test]
    fn cli_queries_take_precedence() {
        let args = ScrapeArgs {
            queries: vec!["habeas".to_string()],
            ..ScrapeArgs::default()
        };
        let queries = resolve_queries(&args, &cfg(vec!["config".to_string()]), today());
        assert_eq!(queries, vec!["habeas"]);
    }

    #[test]
    fn config_queries_beat_generated_months() {
        let queries =
            resolve_queries(&ScrapeArgs::default(), &cfg(vec!["config".to_string()]), today());
        assert_eq!(queries, vec!["config"]);
    }

    #[test]
    fn months_generated_when_nothing_explicit() {
        let queries = resolve_queries(&ScrapeArgs::default(), &cfg(Vec::new()), today());
        assert_eq!(queries, vec!["Jan 2024", "Dec 2023"]);
    }

    #[test]
    fn inverted_delay_window_rejected() {
        let args = ScrapeArgs {
            min_delay_ms: Some(5_000),
            ..ScrapeArgs::default()
        };
        assert!(matches!(
            apply_overrides(cfg(Vec::new()), &args),
            Err(AppError::Config(_))
        ));
    }
}
