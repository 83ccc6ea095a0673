mod config;
mod harvest;
mod models;
mod scrapers;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use config::{Credentials, ScoutConfig};
use harvest::{retry, scrape_index, OutputSink, Pacer, RetrySummary, ScrapeSummary};
use models::Session;
use scrapers::{open_saved_search, BrowserSession, ChromeSession};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Scrape MLS listings into dated tab-separated files")]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape every page of the search index
    Scrape {
        /// Saved search to open first (overrides the config)
        #[arg(long)]
        saved_search: Option<String>,

        /// Whole-run attempts if login or the browser fails
        #[arg(long, default_value_t = 1)]
        attempts: u32,

        /// Minutes to wait between attempts
        #[arg(long, default_value_t = 10)]
        backoff_mins: u64,
    },
    /// Replay the failure ledger of an earlier day
    Retry {
        /// Ledger date as YYYYMMDD (default: yesterday)
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = ScoutConfig::load(&cli.config)?;
    let credentials = config.credentials.resolve()?;
    let pacer = Pacer::new(config.timing.jitter_scale);
    let today = Local::now().date_naive();

    info!("🏠 MLS Scout");

    match cli.command {
        Command::Scrape {
            saved_search,
            attempts,
            backoff_mins,
        } => {
            let saved_search = saved_search.or_else(|| config.portal.saved_search.clone());
            let sink = OutputSink::allocate(&config.output.base, today).context("Failed to open output file")?;
            let attempts = attempts.max(1);

            for attempt in 1..=attempts {
                match run_scrape(&config, &credentials, saved_search.as_deref(), &sink, &pacer).await {
                    Ok(summary) => {
                        log_scrape(&summary, &sink);
                        return Ok(());
                    }
                    Err(e) if attempt < attempts => {
                        warn!(attempt, error = %format!("{e:#}"), "Scrape failed, backing off");
                        tokio::time::sleep(Duration::from_secs(backoff_mins * 60)).await;
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(())
        }
        Command::Retry { date } => {
            let date = match date {
                Some(date) => date,
                None => today.pred_opt().context("No day before today")?,
            };
            let sink = OutputSink::allocate(&config.output.base, today).context("Failed to open output file")?;

            let summary = run_retry(&config, &credentials, date, &sink, &pacer).await?;
            log_retry(&summary, &sink);
            Ok(())
        }
    }
}

async fn start_session(config: &ScoutConfig, credentials: &Credentials, pacer: &Pacer) -> Result<(ChromeSession, Session)> {
    let mut browser = ChromeSession::launch(&config.portal)?;
    browser.login(&config.portal, credentials, pacer).await?;

    let index = browser.current_context().await?;
    let session = Session::new(index, config.output.ledger());
    Ok((browser, session))
}

async fn run_scrape(
    config: &ScoutConfig,
    credentials: &Credentials,
    saved_search: Option<&str>,
    sink: &OutputSink,
    pacer: &Pacer,
) -> Result<ScrapeSummary> {
    let (mut browser, mut session) = start_session(config, credentials, pacer).await?;

    if let Some(name) = saved_search {
        open_saved_search(&mut browser, &config.portal, name, pacer).await?;
    }

    info!("Starting index scrape...");
    let summary = scrape_index(&mut browser, &mut session, sink, &config.site, pacer).await?;
    Ok(summary)
}

async fn run_retry(
    config: &ScoutConfig,
    credentials: &Credentials,
    date: NaiveDate,
    sink: &OutputSink,
    pacer: &Pacer,
) -> Result<RetrySummary> {
    let (mut browser, mut session) = start_session(config, credentials, pacer).await?;

    info!(date = %date.format("%Y%m%d"), "Starting failures from earlier run");
    let summary = retry(&mut browser, &mut session, sink, &config.site, pacer, date).await?;
    Ok(summary)
}

fn log_scrape(summary: &ScrapeSummary, sink: &OutputSink) {
    info!(
        pages = summary.pages,
        entries = summary.entries,
        scraped = summary.scraped,
        skipped = summary.skipped,
        failed = summary.failed,
        errors = summary.errors,
        "✅ Scrape finished"
    );
    info!("💾 Listings saved to {}", sink.path().display());
}

fn log_retry(summary: &RetrySummary, sink: &OutputSink) {
    info!(
        pending = summary.pending,
        scraped = summary.scraped,
        skipped = summary.skipped,
        failed = summary.failed,
        unhandled = summary.unhandled,
        errors = summary.errors,
        "✅ Retry finished"
    );
    info!("💾 Listings saved to {}", sink.path().display());
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y%m%d").map_err(|e| format!("expected YYYYMMDD: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_parse_in_ledger_format() {
        assert_eq!(parse_date("20240309"), Ok(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()));
        assert!(parse_date("2024-03-09").is_err());
    }

    #[test]
    fn cli_parses_both_commands() {
        let cli = Cli::try_parse_from(["mls-scout", "scrape", "--saved-search", "Everything WithinDay"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Scrape { saved_search: Some(ref s), attempts: 1, backoff_mins: 10 } if s == "Everything WithinDay"
        ));

        let cli = Cli::try_parse_from(["mls-scout", "retry", "--date", "20240101", "-c", "alt.toml"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("alt.toml"));
        assert!(matches!(cli.command, Command::Retry { date: Some(_) }));
    }
}
